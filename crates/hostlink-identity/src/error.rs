//! Error types for the identity layer.

use hostlink_backend::UserSlot;

/// Errors that can occur while logging a local user in.
///
/// None of these are fatal: the user simply stays logged out and the
/// login can be attempted again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// The backend refused to start the login at all (bad credential type,
    /// service unavailable).
    #[error("login for {0} was rejected by the backend")]
    LoginRejected(UserSlot),

    /// The login started but the backend reported failure.
    #[error("login for {slot} failed: {error}")]
    LoginFailed { slot: UserSlot, error: String },

    /// A login for this slot is still waiting for its completion.
    #[error("a login for {0} is already pending")]
    AlreadyPending(UserSlot),

    /// No completion arrived within the configured timeout.
    #[error("login for {0} timed out")]
    TimedOut(UserSlot),
}
