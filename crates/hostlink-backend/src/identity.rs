//! The identity half of the backend contract.

use crate::{Credentials, LoginStatus, PlayerId, UserSlot};

/// Client for the backend's identity service.
///
/// Same shape as [`SessionBackend`](crate::SessionBackend): a synchronous
/// accept/reject followed, on accept, by one
/// [`LoginCompletion`](crate::LoginCompletion) for the slot.
pub trait IdentityBackend: Send + 'static {
    /// Logs a local user in with explicit credentials.
    fn login(&mut self, slot: UserSlot, credentials: &Credentials) -> bool;

    /// Logs a local user in with whatever the launch environment provides
    /// (command-line auth parameters, launcher exchange codes, ...).
    fn auto_login(&mut self, slot: UserSlot) -> bool;

    /// Current login status of the slot.
    fn login_status(&self, slot: UserSlot) -> LoginStatus;

    /// The identity bound to the slot, if any.
    fn unique_player_id(&self, slot: UserSlot) -> Option<PlayerId>;
}
