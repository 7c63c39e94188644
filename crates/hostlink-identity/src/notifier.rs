//! User-facing login notices.
//!
//! On a client the login result is shown to the player (an on-screen
//! message, a toast). The controller doesn't care how; it hands a
//! [`Notice`] to whatever [`Notifier`] it was built with.

use std::fmt;

/// A message for the local user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Failure(String),
}

impl Notice {
    /// The notice shown after a successful login.
    pub fn login_succeeded() -> Self {
        Self::Success("Login successful!".to_string())
    }

    /// The notice shown after a failed login, with the backend's error text.
    pub fn login_failed(error: &str) -> Self {
        Self::Failure(format!("Login failed! {error}"))
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Success(text) | Self::Failure(text) => text,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Shows notices to the local user.
///
/// Any `FnMut(Notice)` closure is a notifier, which is the easy way to
/// hook up a UI or capture notices in a test.
pub trait Notifier: Send + 'static {
    fn notify(&mut self, notice: Notice);
}

impl<F> Notifier for F
where
    F: FnMut(Notice) + Send + 'static,
{
    fn notify(&mut self, notice: Notice) {
        self(notice)
    }
}

/// Writes notices to the log. The default for headless builds.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&mut self, notice: Notice) {
        match notice {
            Notice::Success(text) => tracing::info!("{text}"),
            Notice::Failure(text) => tracing::warn!("{text}"),
        }
    }
}
