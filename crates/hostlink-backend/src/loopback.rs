//! In-process backend that answers requests over a Tokio channel.
//!
//! `LoopbackBackend` keeps its own table of sessions and logins and
//! behaves like a remote service would: each accepted request mutates the
//! backend-side state right away, and the completion is delivered later on
//! the [`EventSender`] after a configurable delay. With jitter enabled,
//! completions of different kinds can overtake each other, which is
//! exactly the ordering the host has to cope with.
//!
//! Failures can be injected per kind with [`reject_next`] (the request is
//! refused synchronously) and [`fail_next`] (the request is accepted but
//! its completion reports failure).
//!
//! [`reject_next`]: LoopbackBackend::reject_next
//! [`fail_next`]: LoopbackBackend::fail_next

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use rand::Rng;

use crate::{
    BackendError, BackendEvent, Completion, Credentials, EventSender, IdentityBackend,
    LoginCompletion, LoginStatus, OnlineSessionState, OperationKind, PlayerId, SessionBackend,
    SessionName, SessionRequest, SessionSettings, UserSlot,
};

/// Timing and environment for a [`LoopbackBackend`].
#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    /// Base delay before a completion is delivered. Zero delivers inline,
    /// before `issue` returns.
    pub completion_delay: Duration,
    /// Random extra delay, uniformly `0..=jitter`, added per completion.
    pub jitter: Duration,
    /// Credentials an auto-login picks up from the "environment". `None`
    /// makes every auto-login fail in its completion.
    pub auto_login: Option<Credentials>,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            completion_delay: Duration::from_millis(50),
            jitter: Duration::ZERO,
            auto_login: None,
        }
    }
}

impl LoopbackConfig {
    /// Completions delivered inline with no delay. Handy for tests that
    /// drain the channel right after issuing.
    pub fn immediate() -> Self {
        Self {
            completion_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// A session as the loopback backend stores it.
#[derive(Debug, Clone)]
struct HostedSession {
    state: OnlineSessionState,
    settings: SessionSettings,
    registered: BTreeSet<PlayerId>,
}

/// In-process implementation of both backend services.
pub struct LoopbackBackend {
    config: LoopbackConfig,
    sink: EventSender,
    sessions: HashMap<SessionName, HostedSession>,
    logins: HashMap<UserSlot, PlayerId>,
    reject_next: HashSet<OperationKind>,
    fail_next: HashSet<OperationKind>,
    issued: Vec<SessionRequest>,
}

impl LoopbackBackend {
    /// Creates a backend that delivers notifications to `sink`.
    pub fn new(config: LoopbackConfig, sink: EventSender) -> Self {
        Self {
            config,
            sink,
            sessions: HashMap::new(),
            logins: HashMap::new(),
            reject_next: HashSet::new(),
            fail_next: HashSet::new(),
            issued: Vec::new(),
        }
    }

    /// Makes the next request of `kind` be refused synchronously.
    pub fn reject_next(&mut self, kind: OperationKind) {
        self.reject_next.insert(kind);
    }

    /// Makes the next accepted request of `kind` complete with failure.
    pub fn fail_next(&mut self, kind: OperationKind) {
        self.fail_next.insert(kind);
    }

    /// Every accepted session request, in issue order.
    pub fn issued(&self) -> &[SessionRequest] {
        &self.issued
    }

    /// Number of accepted requests of `kind`.
    pub fn issued_count(&self, kind: OperationKind) -> usize {
        self.issued.iter().filter(|r| r.kind() == kind).count()
    }

    /// Players the backend currently has registered in `session`.
    pub fn registered_players(&self, session: &SessionName) -> Vec<PlayerId> {
        self.sessions
            .get(session)
            .map(|s| s.registered.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The settings a session was created with.
    pub fn settings(&self, session: &SessionName) -> Option<&SessionSettings> {
        self.sessions.get(session).map(|s| &s.settings)
    }

    /// Structural checks. A request that fails here is refused outright.
    fn check_request(request: &SessionRequest) -> Result<(), BackendError> {
        if request.session().as_str().is_empty() {
            return Err(BackendError::InvalidRequest("empty session name".into()));
        }
        match request {
            SessionRequest::RegisterPlayers { players, .. }
            | SessionRequest::UnregisterPlayers { players, .. }
                if players.is_empty() =>
            {
                Err(BackendError::InvalidRequest(format!(
                    "{} request without players",
                    request.kind()
                )))
            }
            SessionRequest::Create { settings, .. } if settings.num_public_connections == 0 => {
                Err(BackendError::InvalidRequest(
                    "session needs at least one public connection".into(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Applies an accepted request to the backend-side session table.
    /// An error here becomes a failed completion.
    fn apply(&mut self, request: &SessionRequest) -> Result<(), BackendError> {
        let name = request.session().clone();
        match request {
            SessionRequest::Create { settings, .. } => {
                if self.sessions.contains_key(&name) {
                    return Err(BackendError::SessionExists(name));
                }
                self.sessions.insert(
                    name,
                    HostedSession {
                        state: OnlineSessionState::Pending,
                        settings: settings.clone(),
                        registered: BTreeSet::new(),
                    },
                );
                Ok(())
            }
            SessionRequest::RegisterPlayers { players, .. } => {
                let session = self
                    .sessions
                    .get_mut(&name)
                    .ok_or_else(|| BackendError::SessionNotFound(name.clone()))?;
                if session.state == OnlineSessionState::InProgress
                    && !session.settings.allow_join_in_progress
                {
                    return Err(BackendError::InvalidRequest(format!(
                        "session {name} does not allow joins in progress"
                    )));
                }
                session.registered.extend(players.iter().cloned());
                Ok(())
            }
            SessionRequest::UnregisterPlayers { players, .. } => {
                let session = self
                    .sessions
                    .get_mut(&name)
                    .ok_or_else(|| BackendError::SessionNotFound(name.clone()))?;
                for player in players {
                    session.registered.remove(player);
                }
                Ok(())
            }
            SessionRequest::Start { .. } => {
                self.transition(&name, OnlineSessionState::Pending, OnlineSessionState::InProgress)
            }
            SessionRequest::End { .. } => {
                self.transition(&name, OnlineSessionState::InProgress, OnlineSessionState::Ended)
            }
            SessionRequest::Destroy { .. } => self
                .sessions
                .remove(&name)
                .map(|_| ())
                .ok_or(BackendError::SessionNotFound(name)),
        }
    }

    fn transition(
        &mut self,
        name: &SessionName,
        from: OnlineSessionState,
        to: OnlineSessionState,
    ) -> Result<(), BackendError> {
        let session = self
            .sessions
            .get_mut(name)
            .ok_or_else(|| BackendError::SessionNotFound(name.clone()))?;
        if session.state != from {
            return Err(BackendError::InvalidRequest(format!(
                "session {name} is {}, expected {from}",
                session.state
            )));
        }
        session.state = to;
        Ok(())
    }

    /// Delivers an event after the configured delay.
    fn deliver(&self, event: BackendEvent) {
        let mut delay = self.config.completion_delay;
        if !self.config.jitter.is_zero() {
            let max = u64::try_from(self.config.jitter.as_micros()).unwrap_or(u64::MAX);
            let jitter = Duration::from_micros(rand::rng().random_range(0..=max));
            delay = delay.saturating_add(jitter);
        }

        if delay.is_zero() {
            if self.sink.send(event).is_err() {
                tracing::warn!(error = %BackendError::ChannelClosed, "completion dropped");
            }
            return;
        }

        let sink = self.sink.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if sink.send(event).is_err() {
                tracing::warn!(error = %BackendError::ChannelClosed, "completion dropped");
            }
        });
    }

    fn finish_login(&mut self, slot: UserSlot, credentials: Option<&Credentials>) {
        let completion = match credentials {
            Some(creds) if !creds.token.is_empty() => {
                let identity = PlayerId(generate_id());
                self.logins.insert(slot, identity.clone());
                tracing::debug!(%slot, %identity, kind = %creds.kind, "loopback login succeeded");
                LoginCompletion {
                    slot,
                    success: true,
                    identity: Some(identity),
                    error: String::new(),
                }
            }
            Some(_) => LoginCompletion {
                slot,
                success: false,
                identity: None,
                error: "credentials rejected".into(),
            },
            None => LoginCompletion {
                slot,
                success: false,
                identity: None,
                error: "no auto-login credentials in the environment".into(),
            },
        };
        self.deliver(BackendEvent::Login(completion));
    }
}

impl SessionBackend for LoopbackBackend {
    fn issue(&mut self, request: SessionRequest) -> bool {
        let kind = request.kind();

        if self.reject_next.remove(&kind) {
            tracing::debug!(%kind, "loopback rejecting request (injected)");
            return false;
        }
        if let Err(e) = Self::check_request(&request) {
            tracing::debug!(%kind, error = %e, "loopback rejecting request");
            return false;
        }

        let success = if self.fail_next.remove(&kind) {
            tracing::debug!(%kind, "loopback failing request (injected)");
            false
        } else {
            match self.apply(&request) {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(%kind, error = %e, "loopback request failed");
                    false
                }
            }
        };

        let completion = Completion::new(kind, request.session().clone(), success)
            .with_players(request.players().to_vec());
        self.issued.push(request);
        self.deliver(BackendEvent::Session(completion));
        true
    }

    fn session_state(&self, session: &SessionName) -> OnlineSessionState {
        self.sessions
            .get(session)
            .map(|s| s.state)
            .unwrap_or(OnlineSessionState::NonExistent)
    }
}

impl IdentityBackend for LoopbackBackend {
    fn login(&mut self, slot: UserSlot, credentials: &Credentials) -> bool {
        if credentials.kind.is_empty() {
            tracing::debug!(%slot, "loopback rejecting login without credential type");
            return false;
        }
        self.finish_login(slot, Some(credentials));
        true
    }

    fn auto_login(&mut self, slot: UserSlot) -> bool {
        let credentials = self.config.auto_login.clone();
        self.finish_login(slot, credentials.as_ref());
        true
    }

    fn login_status(&self, slot: UserSlot) -> LoginStatus {
        if self.logins.contains_key(&slot) {
            LoginStatus::LoggedIn
        } else {
            LoginStatus::NotLoggedIn
        }
    }

    fn unique_player_id(&self, slot: UserSlot) -> Option<PlayerId> {
        self.logins.get(&slot).cloned()
    }
}

/// Generates a 32-character hex id (128 random bits).
fn generate_id() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
