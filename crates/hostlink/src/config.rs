//! Host-level configuration.

use std::path::Path;
use std::time::Duration;

use hostlink_session::{DeploymentRole, SessionConfig};
use serde::{Deserialize, Serialize};

use crate::HostlinkError;

/// Everything a host process needs to run its session.
///
/// Loadable from JSON; every field is optional in the file:
///
/// ```json
/// {
///   "role": "DedicatedServer",
///   "session": { "session_name": "Arena-1", "max_players": 4 },
///   "sweep_interval_ms": 500
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub role: DeploymentRole,
    pub session: SessionConfig,
    /// How often pending operations are checked for timeouts.
    pub sweep_interval_ms: u64,
    /// How long shutdown waits for the session to be destroyed.
    pub shutdown_grace_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            role: DeploymentRole::DedicatedServer,
            session: SessionConfig::default(),
            sweep_interval_ms: 1000,
            shutdown_grace_ms: 5000,
        }
    }
}

impl HostConfig {
    /// Reads and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, HostlinkError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| HostlinkError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parses and validates a JSON config.
    pub fn from_json_str(text: &str) -> Result<Self, HostlinkError> {
        let config: Self = serde_json::from_str(text)?;
        Ok(config.validated())
    }

    /// Fixes values that would stall the host.
    pub fn validated(mut self) -> Self {
        if self.sweep_interval_ms == 0 {
            tracing::warn!("sweep_interval_ms is 0, raising to 1");
            self.sweep_interval_ms = 1;
        }
        self.session = self.session.validated();
        self
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Auto-login hook for the host process.
    ///
    /// A dedicated server has no local user, so there is nothing to log in.
    /// Returns `true` to report the auto-login as handled either way; a
    /// client logs in through an
    /// [`IdentityController`](hostlink_identity::IdentityController) instead.
    pub fn process_auto_login(&self) -> bool {
        if self.role.is_dedicated() {
            tracing::debug!("dedicated server, skipping auto-login");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_str_partial_config() {
        let config = HostConfig::from_json_str(
            r#"{ "session": { "session_name": "Arena-1", "max_players": 4 } }"#,
        )
        .unwrap();
        assert_eq!(config.session.session_name.as_str(), "Arena-1");
        assert_eq!(config.session.max_players, 4);
        assert_eq!(config.role, DeploymentRole::DedicatedServer);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
    }

    #[test]
    fn test_from_json_str_invalid_is_error() {
        let err = HostConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, HostlinkError::ConfigParse(_)));
    }

    #[test]
    fn test_validated_raises_zero_values() {
        let config = HostConfig {
            sweep_interval_ms: 0,
            session: SessionConfig::default().with_max_players(0),
            ..HostConfig::default()
        }
        .validated();
        assert_eq!(config.sweep_interval(), Duration::from_millis(1));
        assert_eq!(config.session.max_players, 1);
    }

    #[test]
    fn test_from_json_file_missing_is_read_error() {
        let err = HostConfig::from_json_file("/nonexistent/hostlink.json").unwrap_err();
        assert!(matches!(err, HostlinkError::ConfigRead { .. }));
    }

    #[test]
    fn test_process_auto_login_always_handled() {
        assert!(HostConfig::default().process_auto_login());
        let client = HostConfig {
            role: DeploymentRole::Client,
            ..HostConfig::default()
        };
        assert!(client.process_auto_login());
    }
}
