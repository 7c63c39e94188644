//! Online-services backend boundary for Hostlink.
//!
//! Hostlink does not implement sessions or identity itself; it drives an
//! external backend that does. This crate describes that backend:
//!
//! - **Contracts**: [`SessionBackend`] and [`IdentityBackend`], the
//!   request side of each service
//! - **Notifications**: [`Completion`], [`LoginCompletion`] and the
//!   [`CompletionRegistry`] used to subscribe to exactly one of them
//! - **Types**: identities, the [`SessionSettings`] payload, backend states
//!
//! # Feature Flags
//!
//! - `loopback` (default): [`LoopbackBackend`], an in-process backend that
//!   answers requests on a Tokio channel. Used by the demo and tests.

mod error;
mod identity;
#[cfg(feature = "loopback")]
mod loopback;
mod notify;
mod session;
mod types;

pub use error::BackendError;
pub use identity::IdentityBackend;
#[cfg(feature = "loopback")]
pub use loopback::{LoopbackBackend, LoopbackConfig};
pub use notify::{
    BackendEvent, Completion, CompletionRegistry, EventReceiver, EventSender, LoginCompletion,
    OperationKind, Pending, SubscriptionToken, event_channel,
};
pub use session::{SessionBackend, SessionRequest};
pub use types::{
    Advertisement, Credentials, LoginStatus, OnlineSessionState, PlayerId, SessionAttribute,
    SessionName, SessionSettings, UserSlot,
};
