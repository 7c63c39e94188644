//! Error types for the backend layer.

use crate::SessionName;

/// Errors raised at the backend boundary.
///
/// Backend calls themselves only answer "accepted" or "rejected"; these
/// variants carry the reason so it can be logged where the rejection
/// happens.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// A completion subscription is already open for this key.
    #[error("a completion subscription is already active for {0}")]
    AlreadySubscribed(String),

    /// No session with this name exists on the backend.
    #[error("session {0} does not exist")]
    SessionNotFound(SessionName),

    /// A session with this name already exists on the backend.
    #[error("session {0} already exists")]
    SessionExists(SessionName),

    /// The request is malformed or not valid in the session's current state.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The notification channel was closed, so the host can no longer
    /// receive completions.
    #[error("notification channel closed")]
    ChannelClosed,
}
