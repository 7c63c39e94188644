//! The session half of the backend contract.

use crate::{OnlineSessionState, OperationKind, PlayerId, SessionName, SessionSettings, UserSlot};

/// A session request, one variant per [`OperationKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRequest {
    Create {
        host: UserSlot,
        session: SessionName,
        settings: SessionSettings,
    },
    RegisterPlayers {
        session: SessionName,
        players: Vec<PlayerId>,
        was_invited: bool,
    },
    UnregisterPlayers {
        session: SessionName,
        players: Vec<PlayerId>,
    },
    Start {
        session: SessionName,
    },
    End {
        session: SessionName,
    },
    Destroy {
        session: SessionName,
    },
}

impl SessionRequest {
    /// The operation kind this request belongs to. Completions for the
    /// request are routed by this kind.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Create { .. } => OperationKind::Create,
            Self::RegisterPlayers { .. } => OperationKind::Register,
            Self::UnregisterPlayers { .. } => OperationKind::Unregister,
            Self::Start { .. } => OperationKind::Start,
            Self::End { .. } => OperationKind::End,
            Self::Destroy { .. } => OperationKind::Destroy,
        }
    }

    /// The session the request targets.
    pub fn session(&self) -> &SessionName {
        match self {
            Self::Create { session, .. }
            | Self::RegisterPlayers { session, .. }
            | Self::UnregisterPlayers { session, .. }
            | Self::Start { session }
            | Self::End { session }
            | Self::Destroy { session } => session,
        }
    }

    /// Players carried by a register/unregister request.
    pub fn players(&self) -> &[PlayerId] {
        match self {
            Self::RegisterPlayers { players, .. } | Self::UnregisterPlayers { players, .. } => {
                players
            }
            _ => &[],
        }
    }
}

/// Client for the backend's session service.
///
/// Implementations are pure request dispatch: [`issue`](Self::issue)
/// answers immediately whether the request was accepted, and every accepted
/// request is later answered by exactly one
/// [`Completion`](crate::Completion) of the same kind, delivered through
/// whatever channel the implementation was built with.
///
/// Calls are made from a single task; nothing here needs to be `Sync`.
pub trait SessionBackend: Send + 'static {
    /// Submits a request. Returns `false` if the backend refused it outright
    /// (malformed, wrong state, already in flight); no completion follows a
    /// refusal.
    fn issue(&mut self, request: SessionRequest) -> bool;

    /// Out-of-band query of the backend's view of a session.
    fn session_state(&self, session: &SessionName) -> OnlineSessionState;
}
