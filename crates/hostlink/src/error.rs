//! Unified error type for Hostlink.

use std::path::PathBuf;

use hostlink_backend::BackendError;
use hostlink_identity::IdentityError;
use hostlink_session::LifecycleError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `hostlink` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attributes let `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum HostlinkError {
    /// A backend-level error (subscription, channel, bad request).
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A session lifecycle error (rejected, failed, timed out, bad state).
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// A login error.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`HostConfig`](crate::HostConfig).
    #[error("invalid config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The host task has exited; its handle can no longer reach it.
    #[error("host is no longer running")]
    HostStopped,
}
