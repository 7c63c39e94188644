//! The identity controller: logs the local user in once per activation.
//!
//! # Flow
//!
//! ```text
//! activate()
//!   ├─ already logged in with an identity → nothing to do
//!   ├─ AUTH_TYPE passed on the command line → auto_login(slot)
//!   └─ otherwise                            → login(slot, developer fallback)
//!        │
//!        ▼
//! handle_login(completion) → notice to the user, subscription released
//! ```
//!
//! Like the session manager, the controller is driven from a single task
//! and keeps one completion subscription per user slot.

use std::fmt;
use std::time::Duration;

use hostlink_backend::{
    CompletionRegistry, Credentials, IdentityBackend, LoginCompletion, LoginStatus, PlayerId,
    UserSlot,
};

use crate::{IdentityError, LaunchArgs, Notice, Notifier, TracingNotifier};

/// Default time to wait for a login completion.
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// How a login was started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginMethod {
    /// The backend reads the launch environment itself.
    Auto { auth_type: String },
    /// Explicit credentials.
    Explicit(Credentials),
}

impl fmt::Display for LoginMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto { auth_type } => write!(f, "auto-login ({auth_type})"),
            Self::Explicit(creds) => write!(f, "{} login", creds.kind),
        }
    }
}

/// What [`IdentityController::activate`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// The slot was already logged in; no login was started.
    AlreadyLoggedIn(PlayerId),
    /// A login is in flight.
    Started(LoginMethod),
}

/// Drives the login flow for one local user slot.
pub struct IdentityController<B: IdentityBackend, N: Notifier = TracingNotifier> {
    backend: B,
    notifier: N,
    args: LaunchArgs,
    slot: UserSlot,
    pending: CompletionRegistry<UserSlot, LoginMethod>,
    timeout: Duration,
    fallback: Credentials,
}

impl<B: IdentityBackend> IdentityController<B, TracingNotifier> {
    /// Creates a controller for the primary user that reports to the log.
    pub fn new(backend: B, args: LaunchArgs) -> Self {
        Self::with_notifier(backend, args, TracingNotifier)
    }
}

impl<B: IdentityBackend, N: Notifier> IdentityController<B, N> {
    /// Creates a controller for the primary user with a custom notifier.
    pub fn with_notifier(backend: B, args: LaunchArgs, notifier: N) -> Self {
        Self {
            backend,
            notifier,
            args,
            slot: UserSlot(0),
            pending: CompletionRegistry::new(),
            timeout: DEFAULT_LOGIN_TIMEOUT,
            fallback: Credentials::dev_fallback(),
        }
    }

    /// Uses a different local user slot.
    pub fn with_slot(mut self, slot: UserSlot) -> Self {
        self.slot = slot;
        self
    }

    /// Sets how long to wait for a login completion.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the credentials used when no auto-login is configured.
    pub fn with_fallback(mut self, credentials: Credentials) -> Self {
        self.fallback = credentials;
        self
    }

    /// Logs the slot in unless it already has an identity.
    ///
    /// # Errors
    /// - [`IdentityError::AlreadyPending`] if a login is in flight
    /// - [`IdentityError::LoginRejected`] if the backend refused to start
    ///   the login; the subscription is released before returning
    pub fn activate(&mut self) -> Result<Activation, IdentityError> {
        if self.backend.login_status(self.slot) == LoginStatus::LoggedIn {
            if let Some(identity) = self.backend.unique_player_id(self.slot) {
                tracing::debug!(slot = %self.slot, %identity, "already logged in");
                return Ok(Activation::AlreadyLoggedIn(identity));
            }
        }

        let method = match self.args.auth_type() {
            Some(auth_type) => LoginMethod::Auto {
                auth_type: auth_type.to_string(),
            },
            None => LoginMethod::Explicit(self.fallback.clone()),
        };

        let token = self
            .pending
            .subscribe(self.slot, method.clone())
            .map_err(|_| IdentityError::AlreadyPending(self.slot))?;

        tracing::info!(slot = %self.slot, %method, "logging in");
        let accepted = match &method {
            LoginMethod::Auto { .. } => self.backend.auto_login(self.slot),
            LoginMethod::Explicit(creds) => self.backend.login(self.slot, creds),
        };
        if !accepted {
            self.pending.unsubscribe(token);
            tracing::warn!(slot = %self.slot, %method, "backend rejected login");
            return Err(IdentityError::LoginRejected(self.slot));
        }
        Ok(Activation::Started(method))
    }

    /// Handles a login completion delivered by the backend.
    ///
    /// Returns `Ok(None)` for a completion nobody is waiting for (another
    /// slot, or one that already timed out).
    ///
    /// # Errors
    /// [`IdentityError::LoginFailed`] if the backend reported failure or
    /// succeeded without handing out an identity.
    pub fn handle_login(
        &mut self,
        completion: LoginCompletion,
    ) -> Result<Option<PlayerId>, IdentityError> {
        let Some(token) = self.pending.token(&completion.slot) else {
            tracing::debug!(slot = %completion.slot, "no pending login, ignoring completion");
            return Ok(None);
        };

        let identity = completion
            .identity
            .or_else(|| self.backend.unique_player_id(completion.slot));

        let outcome = match (completion.success, identity) {
            (true, Some(identity)) => {
                tracing::info!(slot = %completion.slot, %identity, "logged in");
                self.notifier.notify(Notice::login_succeeded());
                Ok(Some(identity))
            }
            (true, None) => {
                let error = "backend reported success without an identity".to_string();
                tracing::warn!(slot = %completion.slot, %error, "login failed");
                self.notifier.notify(Notice::login_failed(&error));
                Err(IdentityError::LoginFailed {
                    slot: completion.slot,
                    error,
                })
            }
            (false, _) => {
                tracing::warn!(slot = %completion.slot, error = %completion.error, "login failed");
                self.notifier.notify(Notice::login_failed(&completion.error));
                Err(IdentityError::LoginFailed {
                    slot: completion.slot,
                    error: completion.error,
                })
            }
        };

        self.pending.unsubscribe(token);
        outcome
    }

    /// Gives up on a login that has waited longer than the timeout.
    /// Returns the slots that expired.
    pub fn expire_overdue(&mut self) -> Vec<UserSlot> {
        let overdue = self.pending.overdue(self.timeout);
        for slot in &overdue {
            if let Some(token) = self.pending.token(slot) {
                self.pending.unsubscribe(token);
            }
            let error = IdentityError::TimedOut(*slot);
            tracing::warn!(%slot, %error, "login expired");
            self.notifier.notify(Notice::login_failed(&error.to_string()));
        }
        overdue
    }

    /// The identity bound to the slot, if logged in.
    pub fn identity(&self) -> Option<PlayerId> {
        self.backend.unique_player_id(self.slot)
    }

    /// Current login status of the slot.
    pub fn login_status(&self) -> LoginStatus {
        self.backend.login_status(self.slot)
    }

    /// Returns `true` while a login is waiting for completion.
    pub fn is_pending(&self) -> bool {
        self.pending.is_active(&self.slot)
    }

    /// Subscriptions opened and released so far.
    pub fn subscription_counts(&self) -> (u64, u64) {
        (self.pending.subscribed(), self.pending.released())
    }

    /// How long a login may wait for its completion.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn slot(&self) -> UserSlot {
        self.slot
    }

    pub fn args(&self) -> &LaunchArgs {
        &self.args
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts or refuses logins; records which entry point was used.
    #[derive(Default)]
    struct StubIdentity {
        refuse: bool,
        logged_in: Option<PlayerId>,
        calls: Vec<&'static str>,
    }

    impl IdentityBackend for StubIdentity {
        fn login(&mut self, _slot: UserSlot, _credentials: &Credentials) -> bool {
            self.calls.push("login");
            !self.refuse
        }

        fn auto_login(&mut self, _slot: UserSlot) -> bool {
            self.calls.push("auto_login");
            !self.refuse
        }

        fn login_status(&self, _slot: UserSlot) -> LoginStatus {
            if self.logged_in.is_some() {
                LoginStatus::LoggedIn
            } else {
                LoginStatus::NotLoggedIn
            }
        }

        fn unique_player_id(&self, _slot: UserSlot) -> Option<PlayerId> {
            self.logged_in.clone()
        }
    }

    #[test]
    fn test_activate_without_auth_type_uses_fallback() {
        let mut ctl = IdentityController::new(StubIdentity::default(), LaunchArgs::default());
        let activation = ctl.activate().unwrap();
        assert_eq!(
            activation,
            Activation::Started(LoginMethod::Explicit(Credentials::dev_fallback()))
        );
        assert_eq!(ctl.backend().calls, vec!["login"]);
    }

    #[test]
    fn test_activate_with_auth_type_auto_logs_in() {
        let args = LaunchArgs::parse(["-AUTH_TYPE=exchangecode"]);
        let mut ctl = IdentityController::new(StubIdentity::default(), args);
        ctl.activate().unwrap();
        assert_eq!(ctl.backend().calls, vec!["auto_login"]);
    }

    #[test]
    fn test_activate_when_logged_in_is_noop() {
        let backend = StubIdentity {
            logged_in: Some(PlayerId::new("me")),
            ..Default::default()
        };
        let mut ctl = IdentityController::new(backend, LaunchArgs::default());
        assert_eq!(
            ctl.activate().unwrap(),
            Activation::AlreadyLoggedIn(PlayerId::new("me"))
        );
        assert!(ctl.backend().calls.is_empty());
        assert_eq!(ctl.subscription_counts(), (0, 0));
    }

    #[test]
    fn test_activate_rejected_releases_subscription() {
        let backend = StubIdentity {
            refuse: true,
            ..Default::default()
        };
        let mut ctl = IdentityController::new(backend, LaunchArgs::default());
        assert_eq!(
            ctl.activate().unwrap_err(),
            IdentityError::LoginRejected(UserSlot(0))
        );
        assert!(!ctl.is_pending());
        assert_eq!(ctl.subscription_counts(), (1, 1));
    }

    #[test]
    fn test_activate_twice_while_pending() {
        let mut ctl = IdentityController::new(StubIdentity::default(), LaunchArgs::default());
        ctl.activate().unwrap();
        assert_eq!(
            ctl.activate().unwrap_err(),
            IdentityError::AlreadyPending(UserSlot(0))
        );
        assert_eq!(ctl.backend().calls.len(), 1);
    }

    #[test]
    fn test_success_without_identity_is_a_failure() {
        let notices = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = notices.clone();
        let mut ctl = IdentityController::with_notifier(
            StubIdentity::default(),
            LaunchArgs::default(),
            move |notice: Notice| sink.lock().unwrap().push(notice),
        );
        ctl.activate().unwrap();
        let result = ctl.handle_login(LoginCompletion {
            slot: UserSlot(0),
            success: true,
            identity: None,
            error: String::new(),
        });
        let Err(IdentityError::LoginFailed { slot, error }) = result else {
            panic!("expected LoginFailed");
        };
        assert_eq!(slot, UserSlot(0));
        assert!(!ctl.is_pending());
        assert_eq!(*notices.lock().unwrap(), vec![Notice::login_failed(&error)]);
    }

    #[test]
    fn test_expire_overdue_with_zero_timeout() {
        let mut ctl = IdentityController::new(StubIdentity::default(), LaunchArgs::default())
            .with_timeout(Duration::ZERO);
        ctl.activate().unwrap();
        assert_eq!(ctl.expire_overdue(), vec![UserSlot(0)]);
        assert!(!ctl.is_pending());
        assert_eq!(ctl.subscription_counts(), (1, 1));
    }
}
