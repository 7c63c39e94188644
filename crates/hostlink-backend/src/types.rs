//! Shared types for the online-services boundary.
//!
//! Everything here is data that crosses between the host and the backend:
//! identities, the session settings payload, and the states the backend
//! reports when asked out-of-band.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique, backend-issued identity for a player.
///
/// Backends hand these out as opaque strings (an account id, a product user
/// id, ...). The host never invents one; it only forwards what the
/// connection layer resolved for a player.
///
/// `#[serde(transparent)]` keeps the JSON form a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Creates a player id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The name a session is known by on the backend.
///
/// A host normally runs exactly one session, so the name is configuration
/// rather than something generated per match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionName(pub String);

impl SessionName {
    /// Creates a session name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the raw name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionName {
    fn default() -> Self {
        Self::new("GameSession")
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Index of a local user on this machine (splitscreen slot).
///
/// Slot 0 is the primary user. A dedicated host has no local user but
/// still passes slot 0 as the "hosting user" when creating sessions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserSlot(pub u32);

impl fmt::Display for UserSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Session settings payload
// ---------------------------------------------------------------------------

/// Where an attribute is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Advertisement {
    /// Kept on the host only, never sent to the backend.
    DontAdvertise,
    /// Published through the online service so searches can match on it.
    #[default]
    ViaOnlineService,
    /// Published through the online service and through ping data.
    ViaOnlineServiceAndPing,
}

impl Advertisement {
    /// Returns `true` if the backend can see (and search on) the attribute.
    pub fn is_advertised(&self) -> bool {
        !matches!(self, Self::DontAdvertise)
    }
}

/// A single custom key/value attribute attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAttribute {
    pub value: String,
    #[serde(default)]
    pub advertisement: Advertisement,
}

impl SessionAttribute {
    /// An attribute published through the online service.
    pub fn advertised(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            advertisement: Advertisement::ViaOnlineService,
        }
    }
}

/// The request payload for creating a session.
///
/// The boolean flags mirror what online-services backends commonly accept.
/// Attributes are kept in a `BTreeMap` so the payload has a stable order
/// when logged or serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Number of public player slots.
    pub num_public_connections: usize,
    /// Whether the session shows up in searches.
    pub should_advertise: bool,
    /// Presence requires a local user, so a headless host leaves it off.
    pub uses_presence: bool,
    pub allow_join_via_presence: bool,
    pub allow_join_via_presence_friends_only: bool,
    pub allow_invites: bool,
    /// Once started, nobody else may join.
    pub allow_join_in_progress: bool,
    pub is_dedicated: bool,
    pub use_lobbies_if_available: bool,
    pub use_lobbies_voice_chat_if_available: bool,
    pub uses_stats: bool,
    /// Custom searchable attributes.
    pub attributes: BTreeMap<String, SessionAttribute>,
}

impl SessionSettings {
    /// Returns `true` if at least one attribute is advertised, which is what
    /// makes the session discoverable by a search.
    pub fn is_discoverable(&self) -> bool {
        self.should_advertise
            && self
                .attributes
                .values()
                .any(|attr| attr.advertisement.is_advertised())
    }
}

// ---------------------------------------------------------------------------
// Backend-reported states
// ---------------------------------------------------------------------------

/// The state of a session as the backend reports it.
///
/// This is the out-of-band view (`session_state`). It is coarser than the
/// host's own lifecycle state because the backend knows nothing about
/// requests still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OnlineSessionState {
    #[default]
    NonExistent,
    /// Created, not started yet.
    Pending,
    InProgress,
    Ended,
}

impl fmt::Display for OnlineSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonExistent => write!(f, "NonExistent"),
            Self::Pending => write!(f, "Pending"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Ended => write!(f, "Ended"),
        }
    }
}

/// Login status of a local user slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoginStatus {
    #[default]
    NotLoggedIn,
    /// Signed in to a local profile only, no online identity.
    UsingLocalProfile,
    LoggedIn,
}

/// Credentials for an explicit login.
///
/// `kind` selects the login flow on the backend ("developer",
/// "accountportal", "exchangecode", ...). `id` and `token` are interpreted
/// by that flow; for the developer flow they are the auth-tool address and
/// the credential name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub kind: String,
    pub id: String,
    pub token: String,
}

impl Credentials {
    /// Credentials served by a local developer auth tool.
    pub fn developer(tool_addr: impl Into<String>, credential_name: impl Into<String>) -> Self {
        Self {
            kind: "Developer".to_string(),
            id: tool_addr.into(),
            token: credential_name.into(),
        }
    }

    /// The development fallback used when nothing is passed on the command line.
    pub fn dev_fallback() -> Self {
        Self::developer("127.0.0.1:8081", "Client1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(attrs: &[(&str, Advertisement)]) -> SessionSettings {
        SessionSettings {
            num_public_connections: 2,
            should_advertise: true,
            uses_presence: false,
            allow_join_via_presence: false,
            allow_join_via_presence_friends_only: false,
            allow_invites: false,
            allow_join_in_progress: false,
            is_dedicated: true,
            use_lobbies_if_available: false,
            use_lobbies_voice_chat_if_available: false,
            uses_stats: true,
            attributes: attrs
                .iter()
                .map(|(k, adv)| {
                    (
                        k.to_string(),
                        SessionAttribute {
                            value: "v".into(),
                            advertisement: *adv,
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_is_discoverable_with_advertised_attribute() {
        let s = settings_with(&[("KeyName", Advertisement::ViaOnlineService)]);
        assert!(s.is_discoverable());
    }

    #[test]
    fn test_is_discoverable_without_attributes_is_false() {
        let s = settings_with(&[]);
        assert!(!s.is_discoverable());
    }

    #[test]
    fn test_is_discoverable_hidden_attribute_only_is_false() {
        let s = settings_with(&[("secret", Advertisement::DontAdvertise)]);
        assert!(!s.is_discoverable());
    }

    #[test]
    fn test_is_discoverable_not_advertised_session_is_false() {
        let mut s = settings_with(&[("KeyName", Advertisement::ViaOnlineService)]);
        s.should_advertise = false;
        assert!(!s.is_discoverable());
    }

    #[test]
    fn test_player_id_serializes_as_bare_string() {
        let json = serde_json::to_string(&PlayerId::new("abc123")).unwrap();
        assert_eq!(json, "\"abc123\"");
    }

    #[test]
    fn test_session_name_default() {
        assert_eq!(SessionName::default().as_str(), "GameSession");
    }

    #[test]
    fn test_dev_fallback_credentials() {
        let c = Credentials::dev_fallback();
        assert_eq!(c.kind, "Developer");
        assert_eq!(c.id, "127.0.0.1:8081");
        assert_eq!(c.token, "Client1");
    }

    #[test]
    fn test_user_slot_display() {
        assert_eq!(UserSlot(0).to_string(), "user-0");
    }
}
