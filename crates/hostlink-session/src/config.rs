//! Session configuration and deployment role.

use std::collections::BTreeMap;
use std::time::Duration;

use hostlink_backend::{SessionAttribute, SessionName, SessionSettings};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DeploymentRole
// ---------------------------------------------------------------------------

/// What kind of process the host is.
///
/// Only a dedicated server owns a backend session. Listen servers and
/// clients pass through the same hooks, which then do nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeploymentRole {
    #[default]
    DedicatedServer,
    ListenServer,
    Client,
}

impl DeploymentRole {
    /// Returns `true` for a headless dedicated server.
    pub fn is_dedicated(&self) -> bool {
        matches!(self, Self::DedicatedServer)
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for the session a host advertises.
///
/// Defaults describe a headless dedicated server: advertised, two player
/// slots, no presence, no invites, no join-in-progress, stats on, and one
/// searchable `KeyName=KeyValue` attribute.
///
/// `#[serde(default)]` lets a config file override only the fields it
/// names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub session_name: SessionName,
    /// Player capacity; also the default auto-start threshold.
    pub max_players: usize,
    /// Custom attributes clients can search on.
    pub attributes: BTreeMap<String, SessionAttribute>,
    pub should_advertise: bool,
    pub uses_presence: bool,
    pub allow_join_via_presence: bool,
    pub allow_join_via_presence_friends_only: bool,
    pub allow_invites: bool,
    pub allow_join_in_progress: bool,
    pub is_dedicated: bool,
    pub use_lobbies_if_available: bool,
    pub use_lobbies_voice_chat_if_available: bool,
    pub uses_stats: bool,
    /// How long (in seconds) to wait for a completion before giving up on
    /// the operation.
    pub completion_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert("KeyName".to_string(), SessionAttribute::advertised("KeyValue"));
        Self {
            session_name: SessionName::default(),
            max_players: 2,
            attributes,
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
            completion_timeout_secs: 30,
        }
    }
}

impl SessionConfig {
    /// Adds (or replaces) an advertised attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(key.into(), SessionAttribute::advertised(value));
        self
    }

    /// Sets the player capacity.
    pub fn with_max_players(mut self, max_players: usize) -> Self {
        self.max_players = max_players;
        self
    }

    /// Fixes values that would make the session unusable.
    ///
    /// - `max_players` is raised to at least 1.
    /// - An advertised session with no advertised attribute gets the
    ///   default `KeyName=KeyValue`, since searches only find sessions
    ///   that carry one.
    pub fn validated(mut self) -> Self {
        if self.max_players == 0 {
            tracing::warn!("max_players is 0, raising to 1");
            self.max_players = 1;
        }
        if self.should_advertise
            && !self
                .attributes
                .values()
                .any(|attr| attr.advertisement.is_advertised())
        {
            tracing::warn!(
                session = %self.session_name,
                "advertised session has no searchable attribute, adding KeyName=KeyValue"
            );
            self.attributes
                .insert("KeyName".to_string(), SessionAttribute::advertised("KeyValue"));
        }
        self
    }

    /// Completion timeout as a `Duration`.
    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }

    /// Builds the create-session payload.
    pub fn settings(&self) -> SessionSettings {
        SessionSettings {
            num_public_connections: self.max_players,
            should_advertise: self.should_advertise,
            uses_presence: self.uses_presence,
            allow_join_via_presence: self.allow_join_via_presence,
            allow_join_via_presence_friends_only: self.allow_join_via_presence_friends_only,
            allow_invites: self.allow_invites,
            allow_join_in_progress: self.allow_join_in_progress,
            is_dedicated: self.is_dedicated,
            use_lobbies_if_available: self.use_lobbies_if_available,
            use_lobbies_voice_chat_if_available: self.use_lobbies_voice_chat_if_available,
            uses_stats: self.uses_stats,
            attributes: self.attributes.clone(),
        }
    }
}
