//! Error types for the session lifecycle layer.

use hostlink_backend::{OperationKind, PlayerId, SessionName};

use crate::{DeploymentRole, SessionState};

/// Why a lifecycle operation did not go through.
///
/// Every variant is recoverable: the manager stays in its last stable
/// state and the operation can be attempted again later. The host hooks
/// log these; the explicit transitions return them so a caller can decide
/// whether to retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// The backend refused to accept the request at all.
    #[error("{kind} request for session {session} was rejected by the backend")]
    IssueRejected {
        kind: OperationKind,
        session: SessionName,
    },

    /// The backend accepted the request and later reported failure.
    #[error("{kind} for session {session} failed")]
    CompletionFailed {
        kind: OperationKind,
        session: SessionName,
    },

    /// No completion arrived within the configured timeout.
    #[error("{kind} for session {session} timed out")]
    TimedOut {
        kind: OperationKind,
        session: SessionName,
    },

    /// An operation of this kind is still waiting for its completion.
    #[error("a {0} operation is already pending")]
    AlreadyPending(OperationKind),

    /// The operation does not apply in the session's current state.
    #[error("cannot {kind} while session is {state}")]
    InvalidState {
        kind: OperationKind,
        state: SessionState,
    },

    /// Session operations only run on a dedicated server.
    #[error("session operations are not available on a {0:?}")]
    NotDedicated(DeploymentRole),

    /// A player left without an identity we could resolve, typically after
    /// an ungraceful disconnect.
    #[error("player has no resolvable identity")]
    MissingIdentity,

    /// Every player slot is taken.
    #[error("session {0} is full")]
    SessionFull(SessionName),

    /// The player is already joined (or joining).
    #[error("player {0} already joined")]
    AlreadyJoined(PlayerId),
}
