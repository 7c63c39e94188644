//! Local-user login for Hostlink.
//!
//! Clients (and listen servers) need an online identity before they can
//! join anything. This crate runs that login once per activation:
//!
//! - [`IdentityController`]: picks auto-login or explicit credentials,
//!   issues the login, and handles its completion
//! - [`LaunchArgs`]: the `KEY=VALUE` launch parameters that select the
//!   login flow (`AUTH_TYPE`, `AUTH_LOGIN`, `AUTH_PASSWORD`)
//! - [`Notifier`]: where "Login successful!" / "Login failed!" go
//!
//! Dedicated servers have no local user and skip this crate entirely.

mod args;
mod controller;
mod error;
mod notifier;

pub use args::{AUTH_LOGIN, AUTH_PASSWORD, AUTH_TYPE, LaunchArgs};
pub use controller::{Activation, DEFAULT_LOGIN_TIMEOUT, IdentityController, LoginMethod};
pub use error::IdentityError;
pub use notifier::{Notice, Notifier, TracingNotifier};
