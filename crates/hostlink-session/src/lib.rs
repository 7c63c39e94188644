//! Session lifecycle management for Hostlink.
//!
//! A dedicated host owns exactly one backend session and walks it through
//! its lifecycle:
//!
//! 1. **Create** when the host starts
//! 2. **Register / unregister** players as they connect and disconnect
//! 3. **Start** when the session fills up, **end** when it empties
//! 4. **Destroy** when the host shuts down
//!
//! Every step is an asynchronous backend request answered later by a
//! completion. [`SessionLifecycleManager`] pairs each request with exactly
//! one completion and keeps the host's view of the session consistent no
//! matter what order those completions arrive in.
//!
//! # How it fits in the stack
//!
//! ```text
//! Host driver (above)  ← forwards host events and backend completions
//!     ↕
//! Lifecycle layer (this crate)  ← state machine, player accounting
//!     ↕
//! Backend layer (below)  ← SessionBackend, Completion, CompletionRegistry
//! ```

mod config;
mod error;
mod manager;
mod policy;
mod state;

pub use config::{DeploymentRole, SessionConfig};
pub use error::LifecycleError;
pub use manager::SessionLifecycleManager;
pub use policy::{CapacityPolicy, LifecyclePolicy, ManualStartPolicy, ThresholdPolicy};
pub use state::{RegistrationStatus, SessionSnapshot, SessionState};
