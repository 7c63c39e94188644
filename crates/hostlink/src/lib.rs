//! # Hostlink
//!
//! Dedicated-host integration between a game server's session lifecycle
//! and an online-services backend.
//!
//! The game server reports what happens to it (started, player joined,
//! player left, stopping); Hostlink turns that into the right sequence of
//! asynchronous backend calls (create, register, start, unregister, end,
//! destroy) and keeps the session consistent whatever order the
//! completions come back in.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hostlink::prelude::*;
//!
//! # async fn demo() -> Result<(), HostlinkError> {
//! let config = HostConfig::default();
//! let (tx, rx) = event_channel();
//! let backend = LoopbackBackend::new(LoopbackConfig::default(), tx);
//! let manager = SessionLifecycleManager::new(backend, config.session.clone(), config.role);
//!
//! let (host, task) = Host::spawn(manager, rx, &config);
//! host.started().await?;
//! host.player_joined(PlayerId::new("player-1")).await?;
//! let last = host.shutdown().await?;
//! # let _ = (last, task);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod host;
mod login;

pub use config::HostConfig;
pub use error::HostlinkError;
pub use host::{Host, HostEvent, HostHandle};
pub use login::log_in;

/// Re-exports of every public type across the Hostlink crates.
pub mod prelude {
    pub use crate::{Host, HostConfig, HostEvent, HostHandle, HostlinkError, init_tracing, log_in};
    pub use hostlink_backend::{
        BackendEvent, Completion, Credentials, EventReceiver, EventSender, IdentityBackend,
        LoginStatus, OnlineSessionState, OperationKind, PlayerId, SessionBackend, SessionName,
        SessionRequest, SessionSettings, UserSlot, event_channel,
    };
    #[cfg(feature = "loopback")]
    pub use hostlink_backend::{LoopbackBackend, LoopbackConfig};
    pub use hostlink_identity::{
        Activation, IdentityController, IdentityError, LaunchArgs, Notice, Notifier,
        TracingNotifier,
    };
    pub use hostlink_session::{
        CapacityPolicy, DeploymentRole, LifecycleError, LifecyclePolicy, ManualStartPolicy,
        RegistrationStatus, SessionConfig, SessionLifecycleManager, SessionSnapshot,
        SessionState, ThresholdPolicy,
    };
}

/// Installs a `tracing` subscriber that writes to stderr.
///
/// Honours `RUST_LOG`; defaults to `info`. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
