//! The session lifecycle manager: sequences backend session operations.
//!
//! This is the central piece of the crate. It's responsible for:
//! - Creating the session when the host starts, destroying it when the
//!   host stops
//! - Registering and unregistering players as they join and leave
//! - Counting registered players and starting/ending the session
//!   automatically when the [`LifecyclePolicy`] asks for it
//! - Pairing every backend request with exactly one completion
//!
//! # Concurrency note
//!
//! `SessionLifecycleManager` is NOT thread-safe and doesn't need to be.
//! Backend completions are delivered to the same task that raises host
//! events, so every method runs to completion before the next event is
//! looked at. What the manager *does* have to handle is ordering: a
//! completion can arrive after any number of joins, leaves, or other
//! completions.
//!
//! # Single flight per kind
//!
//! At most one request of each [`OperationKind`] is outstanding. Joins and
//! leaves that arrive while a register/unregister is in flight are queued
//! and sent as one batch when that completion lands. Automatic start/end
//! never fire while a lifecycle request is pending.

use std::collections::HashMap;

use hostlink_backend::{
    Completion, CompletionRegistry, OnlineSessionState, OperationKind, PlayerId, SessionBackend,
    SessionName, SessionRequest, UserSlot,
};

use crate::{
    CapacityPolicy, DeploymentRole, LifecycleError, LifecyclePolicy, RegistrationStatus,
    SessionConfig, SessionSnapshot, SessionState,
};

/// Context kept with each pending operation.
#[derive(Debug, Clone)]
struct PendingContext {
    /// Stable state to return to if the operation fails or times out.
    rollback: SessionState,
    /// Players carried by a register/unregister batch.
    players: Vec<PlayerId>,
}

/// Owns the host's session and drives it through its lifecycle.
///
/// ## Lifecycle
///
/// ```text
/// on_host_start() ──→ create ──→ on_player_join() × N ──→ register
///                                                          │ (policy: full?)
///                                                          ▼
///                                  on_player_leave() ◄── start
///                                        │ (policy: empty?)
///                                        ▼
///                    on_host_stop() ──→ end ──→ destroy
/// ```
///
/// The host calls the four `on_*` hooks and feeds every backend
/// completion to [`handle_completion`](Self::handle_completion). Hooks
/// never fail: problems are logged and the session stays in its last
/// stable state. The explicit transitions (`create_session`,
/// `start_session`, ...) return their error so callers can retry.
pub struct SessionLifecycleManager<B: SessionBackend, P: LifecyclePolicy = CapacityPolicy> {
    backend: B,
    policy: P,
    config: SessionConfig,
    role: DeploymentRole,
    state: SessionState,

    /// Players the backend has confirmed and who have not left.
    registered: usize,

    /// Registration record per connected player.
    records: HashMap<PlayerId, RegistrationStatus>,

    /// Joined players waiting for the next register batch.
    join_queue: Vec<PlayerId>,

    /// Departed players waiting for the next unregister batch.
    leave_queue: Vec<PlayerId>,

    /// One completion subscription per operation kind.
    pending: CompletionRegistry<OperationKind, PendingContext>,

    /// Everyone left while Start was in flight; end once it completes.
    end_deferred: bool,
}

impl<B: SessionBackend> SessionLifecycleManager<B, CapacityPolicy> {
    /// Creates a manager with the default start-when-full policy.
    pub fn new(backend: B, config: SessionConfig, role: DeploymentRole) -> Self {
        Self::with_policy(backend, config, role, CapacityPolicy)
    }
}

impl<B: SessionBackend, P: LifecyclePolicy> SessionLifecycleManager<B, P> {
    /// Creates a manager with a custom auto-transition policy.
    pub fn with_policy(backend: B, config: SessionConfig, role: DeploymentRole, policy: P) -> Self {
        Self {
            backend,
            policy,
            config: config.validated(),
            role,
            state: SessionState::NonExistent,
            registered: 0,
            records: HashMap::new(),
            join_queue: Vec::new(),
            leave_queue: Vec::new(),
            pending: CompletionRegistry::new(),
            end_deferred: false,
        }
    }

    // =====================================================================
    // Host hooks
    // =====================================================================

    /// The host process has started.
    ///
    /// Creates the session on a dedicated server, unless one already exists
    /// or is being created.
    pub fn on_host_start(&mut self) {
        if !self.role.is_dedicated() {
            tracing::debug!(role = ?self.role, "not a dedicated server, no session to create");
            return;
        }
        if self.state != SessionState::NonExistent {
            tracing::debug!(
                session = %self.config.session_name,
                state = %self.state,
                "session already exists, not creating another"
            );
            return;
        }
        if let Err(e) = self.create_session() {
            self.report(&e);
        }
    }

    /// The host process is shutting down.
    ///
    /// Destroys the session whatever state it is in, so nothing is left
    /// behind on the backend.
    pub fn on_host_stop(&mut self) {
        match self.destroy_session() {
            Ok(()) => {}
            Err(LifecycleError::InvalidState { .. }) => {
                tracing::debug!(session = %self.config.session_name, "no session to destroy");
            }
            Err(LifecycleError::AlreadyPending(_)) => {
                tracing::debug!(session = %self.config.session_name, "destroy already pending");
            }
            Err(LifecycleError::NotDedicated(role)) => {
                tracing::debug!(?role, "not a dedicated server, no session to destroy");
            }
            Err(e) => self.report(&e),
        }
    }

    /// A player connected to the host.
    pub fn on_player_join(&mut self, player: PlayerId) {
        if !self.role.is_dedicated() {
            return;
        }
        if let Err(e) = self.join(player) {
            self.report(&e);
        }
    }

    /// A player disconnected from the host.
    ///
    /// `None` means the connection layer could not resolve who left (an
    /// ungraceful disconnect). Unregistration is skipped for them, but
    /// they still count as a departure.
    pub fn on_player_leave(&mut self, player: Option<PlayerId>) {
        if !self.role.is_dedicated() {
            tracing::info!(
                "player is leaving the server; this may be a kick because the server is full \
                 if the player didn't leave intentionally"
            );
            return;
        }

        let counted = match player {
            Some(player) => self.leave(player),
            None => {
                self.report(&LifecycleError::MissingIdentity);
                true
            }
        };
        if !counted {
            return;
        }

        if self.registered == 0 {
            tracing::warn!(
                session = %self.config.session_name,
                "leave with no registered players, count stays at 0"
            );
        }
        self.registered = self.registered.saturating_sub(1);
        tracing::debug!(
            session = %self.config.session_name,
            players = self.registered,
            "player left"
        );
        self.maybe_auto_end();
    }

    // =====================================================================
    // Explicit transitions
    // =====================================================================

    /// Asks the backend to create the session.
    ///
    /// # Errors
    /// - [`LifecycleError::NotDedicated`] unless running as a dedicated server
    /// - [`LifecycleError::InvalidState`] if a session exists or is in
    ///   any state other than NonExistent
    /// - [`LifecycleError::IssueRejected`] if the backend refused
    pub fn create_session(&mut self) -> Result<(), LifecycleError> {
        self.require(OperationKind::Create, SessionState::NonExistent)?;
        tracing::info!(session = %self.config.session_name, "creating session");
        let request = SessionRequest::Create {
            host: UserSlot(0),
            session: self.config.session_name.clone(),
            settings: self.config.settings(),
        };
        self.issue(request)
    }

    /// Asks the backend to start the session. No joins are accepted
    /// afterwards unless `allow_join_in_progress` is set.
    ///
    /// # Errors
    /// [`LifecycleError::InvalidState`] unless the session is Created.
    pub fn start_session(&mut self) -> Result<(), LifecycleError> {
        self.require(OperationKind::Start, SessionState::Created)?;
        tracing::info!(
            session = %self.config.session_name,
            players = self.registered,
            "starting session"
        );
        let request = SessionRequest::Start {
            session: self.config.session_name.clone(),
        };
        self.issue(request)
    }

    /// Asks the backend to end the session.
    ///
    /// # Errors
    /// [`LifecycleError::InvalidState`] unless the session is InProgress.
    pub fn end_session(&mut self) -> Result<(), LifecycleError> {
        self.require(OperationKind::End, SessionState::InProgress)?;
        tracing::info!(session = %self.config.session_name, "ending session");
        let request = SessionRequest::End {
            session: self.config.session_name.clone(),
        };
        self.issue(request)
    }

    /// Asks the backend to destroy the session.
    ///
    /// Works from any state except NonExistent. A create/start/end still in
    /// flight is abandoned once the destroy is accepted: its completion
    /// will be ignored when it arrives. If a destroy that abandoned a
    /// create fails, the session is treated as Created so it can be
    /// destroyed again.
    ///
    /// # Errors
    /// - [`LifecycleError::AlreadyPending`] if a destroy is in flight
    /// - [`LifecycleError::InvalidState`] if there is no session
    /// - [`LifecycleError::IssueRejected`] if the backend refused; anything
    ///   in flight is left untouched in that case
    pub fn destroy_session(&mut self) -> Result<(), LifecycleError> {
        if !self.role.is_dedicated() {
            return Err(LifecycleError::NotDedicated(self.role));
        }
        if self.pending.is_active(&OperationKind::Destroy) {
            return Err(LifecycleError::AlreadyPending(OperationKind::Destroy));
        }
        if self.state == SessionState::NonExistent {
            return Err(LifecycleError::InvalidState {
                kind: OperationKind::Destroy,
                state: self.state,
            });
        }

        tracing::info!(
            session = %self.config.session_name,
            state = %self.state,
            "destroying session"
        );
        // An abandoned create may still land on the backend, so a failed
        // destroy must leave a state that can issue another one.
        let rollback = if self.pending.is_active(&OperationKind::Create) {
            SessionState::Created
        } else {
            self.state.stable()
        };
        let request = SessionRequest::Destroy {
            session: self.config.session_name.clone(),
        };
        self.issue_with_rollback(request, rollback)?;

        for kind in [OperationKind::Create, OperationKind::Start, OperationKind::End] {
            if let Some(token) = self.pending.token(&kind) {
                self.pending.unsubscribe(token);
                tracing::info!(
                    session = %self.config.session_name,
                    %kind,
                    "abandoning pending operation for destroy"
                );
            }
        }
        Ok(())
    }

    // =====================================================================
    // Completions and timeouts
    // =====================================================================

    /// Handles a completion delivered by the backend.
    ///
    /// A completion is only acted on if a subscription for its kind is
    /// active; anything else (abandoned, timed out, for another session)
    /// is ignored. Handling happens in a fixed order: apply the outcome,
    /// release the subscription, then run whatever the outcome triggers.
    ///
    /// # Errors
    /// [`LifecycleError::CompletionFailed`] if the backend reported failure.
    /// The failure has already been handled and logged; the error is only
    /// informational.
    pub fn handle_completion(&mut self, completion: Completion) -> Result<(), LifecycleError> {
        let kind = completion.kind;
        if completion.session != self.config.session_name {
            tracing::debug!(
                session = %completion.session,
                %kind,
                "completion for another session, ignoring"
            );
            return Ok(());
        }
        let Some(pending) = self.pending.get(&kind) else {
            tracing::debug!(
                session = %completion.session,
                %kind,
                "no active subscription, ignoring stale completion"
            );
            return Ok(());
        };
        let token = pending.token;
        let context = pending.context.clone();

        let players = if completion.players.is_empty() {
            context.players.clone()
        } else {
            completion.players
        };

        self.apply_outcome(kind, &context, completion.success, &players);
        self.pending.unsubscribe(token);
        self.follow_up(kind, completion.success);

        if completion.success {
            Ok(())
        } else {
            Err(LifecycleError::CompletionFailed {
                kind,
                session: self.config.session_name.clone(),
            })
        }
    }

    /// Gives up on every operation that has waited longer than the
    /// configured completion timeout.
    ///
    /// Each expired operation is handled as a failure: state rolls back,
    /// the subscription is released, and a late completion will be
    /// ignored. Returns the kinds that expired.
    pub fn expire_overdue(&mut self) -> Vec<OperationKind> {
        let mut overdue = self.pending.overdue(self.config.completion_timeout());
        overdue.sort();

        for kind in &overdue {
            let Some(pending) = self.pending.get(kind) else {
                continue;
            };
            let token = pending.token;
            let context = pending.context.clone();

            self.apply_outcome(*kind, &context, false, &context.players);
            self.pending.unsubscribe(token);
            self.report(&LifecycleError::TimedOut {
                kind: *kind,
                session: self.config.session_name.clone(),
            });
            self.follow_up(*kind, false);
        }
        overdue
    }

    // =====================================================================
    // Accessors
    // =====================================================================

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns `true` once creation succeeded and until destruction succeeds.
    pub fn session_exists(&self) -> bool {
        self.state.exists()
    }

    /// Number of players the backend has confirmed.
    pub fn registered_players(&self) -> usize {
        self.registered
    }

    /// Registration status of a player, if they are known.
    pub fn registration(&self, player: &PlayerId) -> Option<RegistrationStatus> {
        self.records.get(player).copied()
    }

    /// Returns `true` if an operation of `kind` is waiting for completion.
    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.pending.is_active(&kind)
    }

    /// Operation kinds waiting for completion, in lifecycle order.
    pub fn pending_kinds(&self) -> Vec<OperationKind> {
        OperationKind::ALL
            .into_iter()
            .filter(|kind| self.pending.is_active(kind))
            .collect()
    }

    /// Subscriptions opened and released so far. Equal once every
    /// operation has settled.
    pub fn subscription_counts(&self) -> (u64, u64) {
        (self.pending.subscribed(), self.pending.released())
    }

    /// A read-only view of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            name: self.config.session_name.clone(),
            state: self.state,
            registered_players: self.registered,
            max_players: self.config.max_players,
            pending: self.pending_kinds(),
        }
    }

    /// The session name.
    pub fn session_name(&self) -> &SessionName {
        &self.config.session_name
    }

    /// The configuration in use (after validation).
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The deployment role.
    pub fn role(&self) -> DeploymentRole {
        self.role
    }

    /// The auto-transition policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// The backend client.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend client, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    // =====================================================================
    // Internals
    // =====================================================================

    /// Checks that a lifecycle transition may be issued from the current
    /// state.
    fn require(&self, kind: OperationKind, expected: SessionState) -> Result<(), LifecycleError> {
        if !self.role.is_dedicated() {
            return Err(LifecycleError::NotDedicated(self.role));
        }
        if self.pending.is_active(&kind) {
            return Err(LifecycleError::AlreadyPending(kind));
        }
        if self.state != expected {
            return Err(LifecycleError::InvalidState {
                kind,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Subscribes, then submits. A refused request releases its
    /// subscription before returning.
    fn issue(&mut self, request: SessionRequest) -> Result<(), LifecycleError> {
        self.issue_with_rollback(request, self.state.stable())
    }

    /// Like [`issue`](Self::issue), with the state to return to if the
    /// operation fails.
    fn issue_with_rollback(
        &mut self,
        request: SessionRequest,
        rollback: SessionState,
    ) -> Result<(), LifecycleError> {
        let kind = request.kind();
        let session = request.session().clone();
        let context = PendingContext {
            rollback,
            players: request.players().to_vec(),
        };

        let token = self
            .pending
            .subscribe(kind, context)
            .map_err(|_| LifecycleError::AlreadyPending(kind))?;

        if !self.backend.issue(request) {
            self.pending.unsubscribe(token);
            return Err(LifecycleError::IssueRejected { kind, session });
        }

        if let Some(next) = SessionState::transitional_for(kind) {
            self.state = next;
        }
        Ok(())
    }

    fn join(&mut self, player: PlayerId) -> Result<(), LifecycleError> {
        if let Some(status) = self.records.get(&player) {
            if *status != RegistrationStatus::Unregistered {
                return Err(LifecycleError::AlreadyJoined(player));
            }
        }
        if !self.state.accepts_joins(self.config.allow_join_in_progress) {
            return Err(LifecycleError::InvalidState {
                kind: OperationKind::Register,
                state: self.state,
            });
        }
        // Anonymous leaves keep their record, so count confirmed players.
        let pending = self
            .records
            .values()
            .filter(|status| **status == RegistrationStatus::Pending)
            .count();
        if self.registered + pending >= self.config.max_players {
            return Err(LifecycleError::SessionFull(self.config.session_name.clone()));
        }

        // Back before their unregistration went out: the backend still has
        // them, so drop the queued leave and count them again.
        if let Some(pos) = self.leave_queue.iter().position(|p| *p == player) {
            self.leave_queue.remove(pos);
            self.records.insert(player.clone(), RegistrationStatus::Registered);
            self.registered += 1;
            tracing::debug!(
                %player,
                players = self.registered,
                "player rejoined before unregistration was sent"
            );
            self.maybe_auto_start();
            return Ok(());
        }

        self.records.insert(player.clone(), RegistrationStatus::Pending);
        tracing::trace!(%player, queued = self.join_queue.len() + 1, "join queued");
        self.join_queue.push(player);
        self.flush_registrations();
        Ok(())
    }

    /// Records a departure. Returns `true` if the player was counted as
    /// registered, which is what the leave accounting decrements.
    fn leave(&mut self, player: PlayerId) -> bool {
        match self.records.get(&player).copied() {
            Some(RegistrationStatus::Registered) => {
                self.records
                    .insert(player.clone(), RegistrationStatus::Unregistered);
                tracing::trace!(%player, "leave queued");
                self.leave_queue.push(player);
                self.flush_unregistrations();
                true
            }
            Some(RegistrationStatus::Pending) => {
                if let Some(pos) = self.join_queue.iter().position(|p| *p == player) {
                    self.join_queue.remove(pos);
                    self.records.remove(&player);
                    tracing::debug!(%player, "player left before registration was sent");
                } else {
                    // The register completion will see this and unregister.
                    self.records
                        .insert(player.clone(), RegistrationStatus::Unregistered);
                    tracing::debug!(%player, "player left while registration in flight");
                }
                false
            }
            Some(RegistrationStatus::Unregistered) | None => {
                tracing::debug!(%player, "leave for a player that is not joined");
                false
            }
        }
    }

    fn flush_registrations(&mut self) {
        if self.join_queue.is_empty()
            || self.pending.is_active(&OperationKind::Register)
            || !self.state.can_register(self.config.allow_join_in_progress)
        {
            return;
        }

        let players = std::mem::take(&mut self.join_queue);
        let request = SessionRequest::RegisterPlayers {
            session: self.config.session_name.clone(),
            players: players.clone(),
            was_invited: false,
        };
        if let Err(e) = self.issue(request) {
            for player in &players {
                self.records.remove(player);
            }
            self.report(&e);
        }
    }

    fn flush_unregistrations(&mut self) {
        if self.leave_queue.is_empty()
            || self.pending.is_active(&OperationKind::Unregister)
            || !self.state.exists()
            || self.state == SessionState::Destroying
        {
            return;
        }

        let players: Vec<PlayerId> = std::mem::take(&mut self.leave_queue)
            .into_iter()
            .filter(|player| {
                self.records.get(player) == Some(&RegistrationStatus::Unregistered)
            })
            .collect();
        if players.is_empty() {
            return;
        }
        let request = SessionRequest::UnregisterPlayers {
            session: self.config.session_name.clone(),
            players: players.clone(),
        };
        if let Err(e) = self.issue(request) {
            for player in &players {
                self.records.remove(player);
            }
            self.report(&e);
        }
    }

    /// Applies the outcome of a completion (or timeout) to local state.
    fn apply_outcome(
        &mut self,
        kind: OperationKind,
        context: &PendingContext,
        success: bool,
        players: &[PlayerId],
    ) {
        let session = &self.config.session_name;
        match (kind, success) {
            (OperationKind::Create, true) => {
                self.state = SessionState::Created;
                tracing::info!(%session, "session created");
            }
            (OperationKind::Start, true) => {
                self.state = SessionState::InProgress;
                tracing::info!(%session, players = self.registered, "session started");
            }
            (OperationKind::End, true) => {
                self.state = SessionState::Ended;
                tracing::info!(%session, "session ended");
            }
            (OperationKind::Destroy, true) => {
                tracing::info!(%session, "session destroyed");
                self.reset_after_destroy();
            }
            (OperationKind::Register, true) => self.confirm_registrations(players),
            (OperationKind::Register, false) => {
                tracing::warn!(%session, players = players.len(), "failed to register players");
                for player in players {
                    if self.records.get(player) != Some(&RegistrationStatus::Registered) {
                        self.records.remove(player);
                    }
                }
            }
            (OperationKind::Unregister, success) => {
                if success {
                    tracing::info!(%session, players = players.len(), "players unregistered");
                } else {
                    tracing::warn!(%session, players = players.len(), "failed to unregister players");
                }
                for player in players {
                    if self.records.get(player) == Some(&RegistrationStatus::Unregistered) {
                        self.records.remove(player);
                    }
                }
            }
            (_, false) => {
                self.state = context.rollback;
                tracing::warn!(%session, %kind, state = %self.state, "operation failed, state rolled back");
            }
        }
    }

    fn confirm_registrations(&mut self, players: &[PlayerId]) {
        for player in players {
            match self.records.get(player).copied() {
                Some(RegistrationStatus::Pending) => {
                    self.records
                        .insert(player.clone(), RegistrationStatus::Registered);
                    self.registered += 1;
                    tracing::info!(
                        session = %self.config.session_name,
                        %player,
                        players = self.registered,
                        "player registered"
                    );
                }
                Some(RegistrationStatus::Unregistered) => {
                    tracing::debug!(%player, "registered after leaving, unregistering");
                    self.leave_queue.push(player.clone());
                }
                Some(RegistrationStatus::Registered) => {
                    tracing::debug!(%player, "duplicate registration confirmation");
                }
                None => {
                    tracing::warn!(%player, "registration completed for an unknown player");
                }
            }
        }
    }

    fn reset_after_destroy(&mut self) {
        for kind in [OperationKind::Register, OperationKind::Unregister] {
            if let Some(token) = self.pending.token(&kind) {
                self.pending.unsubscribe(token);
                tracing::debug!(%kind, "session destroyed, dropping pending operation");
            }
        }
        self.state = SessionState::NonExistent;
        self.registered = 0;
        self.records.clear();
        self.join_queue.clear();
        self.leave_queue.clear();
        self.end_deferred = false;
    }

    /// Whatever an outcome triggers next. Runs after the subscription for
    /// `kind` has been released.
    fn follow_up(&mut self, kind: OperationKind, success: bool) {
        match kind {
            OperationKind::Create if success => self.flush_registrations(),
            OperationKind::Register => {
                self.flush_registrations();
                self.flush_unregistrations();
                if success {
                    self.maybe_auto_start();
                }
            }
            OperationKind::Unregister => self.flush_unregistrations(),
            OperationKind::Start => {
                let deferred = std::mem::take(&mut self.end_deferred);
                if success {
                    self.flush_registrations();
                    self.drop_unsendable_joins();
                    if deferred {
                        self.maybe_auto_end();
                    }
                }
            }
            OperationKind::End if success && self.policy.destroy_when_ended() => {
                if let Err(e) = self.destroy_session() {
                    self.report(&e);
                }
            }
            _ => {}
        }
    }

    /// Joins still queued when the session went in progress can no longer
    /// be registered.
    fn drop_unsendable_joins(&mut self) {
        if self.state.can_register(self.config.allow_join_in_progress) {
            return;
        }
        for player in std::mem::take(&mut self.join_queue) {
            self.records.remove(&player);
            tracing::warn!(%player, "session started before player could be registered");
        }
    }

    fn maybe_auto_start(&mut self) {
        if self.state != SessionState::Created
            || self.pending.is_active(&OperationKind::Create)
            || self.pending.is_active(&OperationKind::Start)
            || self.pending.is_active(&OperationKind::Destroy)
        {
            return;
        }
        if !self.policy.should_start(&self.snapshot()) {
            return;
        }
        tracing::info!(
            session = %self.config.session_name,
            players = self.registered,
            "start condition reached"
        );
        if let Err(e) = self.start_session() {
            self.report(&e);
        }
    }

    fn maybe_auto_end(&mut self) {
        if !self.policy.should_end(&self.snapshot()) {
            return;
        }
        match self.state {
            SessionState::Starting => {
                self.end_deferred = true;
                tracing::debug!(
                    session = %self.config.session_name,
                    "start still pending, ending once it completes"
                );
            }
            SessionState::InProgress => {
                if self.pending.is_active(&OperationKind::End)
                    || self.pending.is_active(&OperationKind::Destroy)
                {
                    return;
                }
                let online = self.backend.session_state(&self.config.session_name);
                if online != OnlineSessionState::InProgress {
                    tracing::debug!(
                        session = %self.config.session_name,
                        %online,
                        "backend does not report the session in progress, not ending"
                    );
                    return;
                }
                tracing::info!(session = %self.config.session_name, "last player left");
                if let Err(e) = self.end_session() {
                    self.report(&e);
                }
            }
            _ => {}
        }
    }

    fn report(&self, error: &LifecycleError) {
        tracing::warn!(
            session = %self.config.session_name,
            state = %self.state,
            %error,
            "session operation failed"
        );
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests against a minimal in-file backend. The full scenarios
    //! live in `tests/lifecycle.rs`.

    use super::*;

    /// Accepts or refuses everything; never completes anything by itself.
    struct StubBackend {
        accept: bool,
        issued: Vec<SessionRequest>,
        online: OnlineSessionState,
    }

    impl SessionBackend for StubBackend {
        fn issue(&mut self, request: SessionRequest) -> bool {
            if self.accept {
                self.issued.push(request);
            }
            self.accept
        }

        fn session_state(&self, _session: &SessionName) -> OnlineSessionState {
            self.online
        }
    }

    fn manager(accept: bool) -> SessionLifecycleManager<StubBackend> {
        SessionLifecycleManager::new(
            StubBackend {
                accept,
                issued: Vec::new(),
                online: OnlineSessionState::InProgress,
            },
            SessionConfig::default(),
            DeploymentRole::DedicatedServer,
        )
    }

    fn complete(mgr: &mut SessionLifecycleManager<StubBackend>, kind: OperationKind, ok: bool) {
        let players = mgr
            .backend()
            .issued
            .iter()
            .rev()
            .find(|r| r.kind() == kind)
            .map(|r| r.players().to_vec())
            .unwrap_or_default();
        let completion =
            Completion::new(kind, mgr.session_name().clone(), ok).with_players(players);
        let _ = mgr.handle_completion(completion);
    }

    #[test]
    fn test_issue_sets_transitional_state() {
        let mut mgr = manager(true);
        mgr.create_session().unwrap();
        assert_eq!(mgr.state(), SessionState::Creating);
        assert!(mgr.is_pending(OperationKind::Create));
    }

    #[test]
    fn test_issue_rejected_releases_subscription() {
        let mut mgr = manager(false);
        let err = mgr.create_session().unwrap_err();
        assert!(matches!(err, LifecycleError::IssueRejected { .. }));
        assert_eq!(mgr.state(), SessionState::NonExistent);
        assert_eq!(mgr.subscription_counts(), (1, 1));
    }

    #[test]
    fn test_require_rejects_wrong_state() {
        let mut mgr = manager(true);
        let err = mgr.start_session().unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidState {
                kind: OperationKind::Start,
                state: SessionState::NonExistent,
            }
        );
        assert!(mgr.backend().issued.is_empty());
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let mut mgr = manager(true);
        let result = mgr.handle_completion(Completion::new(
            OperationKind::Start,
            mgr.session_name().clone(),
            true,
        ));
        assert!(result.is_ok());
        assert_eq!(mgr.state(), SessionState::NonExistent);
    }

    #[test]
    fn test_completion_for_other_session_is_ignored() {
        let mut mgr = manager(true);
        mgr.create_session().unwrap();
        let _ = mgr.handle_completion(Completion::new(
            OperationKind::Create,
            SessionName::new("someone-else"),
            true,
        ));
        assert_eq!(mgr.state(), SessionState::Creating);
        assert!(mgr.is_pending(OperationKind::Create));
    }

    #[test]
    fn test_failed_completion_returns_error_and_rolls_back() {
        let mut mgr = manager(true);
        mgr.create_session().unwrap();
        let err = mgr
            .handle_completion(Completion::new(
                OperationKind::Create,
                mgr.session_name().clone(),
                false,
            ))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::CompletionFailed { .. }));
        assert_eq!(mgr.state(), SessionState::NonExistent);
        assert!(!mgr.is_pending(OperationKind::Create));
    }

    #[test]
    fn test_join_before_create_is_queued_until_created() {
        let mut mgr = manager(true);
        mgr.on_player_join(PlayerId::new("p1"));
        assert_eq!(
            mgr.registration(&PlayerId::new("p1")),
            Some(RegistrationStatus::Pending)
        );
        assert!(!mgr.is_pending(OperationKind::Register));

        mgr.on_host_start();
        complete(&mut mgr, OperationKind::Create, true);
        assert!(mgr.is_pending(OperationKind::Register));
    }

    #[test]
    fn test_snapshot_reflects_pending() {
        let mut mgr = manager(true);
        mgr.on_host_start();
        let snap = mgr.snapshot();
        assert_eq!(snap.state, SessionState::Creating);
        assert_eq!(snap.pending, vec![OperationKind::Create]);
        assert_eq!(snap.max_players, 2);
    }
}
