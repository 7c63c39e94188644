//! Pluggable auto-transition policy.
//!
//! The manager decides *whether* a transition is legal (right state,
//! nothing in flight). A [`LifecyclePolicy`] decides whether a legal
//! automatic transition is *wanted*. Starting as soon as the session is
//! full and ending once it is empty are sensible defaults, but many games
//! start on a ready-check or a timer instead, so the choice is left here.

use crate::SessionSnapshot;

/// Decides when the manager starts, ends, and destroys the session on
/// its own initiative.
///
/// Every method has a default, so implementing only the one you need is
/// enough. Policies only ever see snapshots; they cannot bypass the
/// manager's own guards.
pub trait LifecyclePolicy: Send + 'static {
    /// Called after a registration lands while the session is Created.
    ///
    /// Default: start once the registered player count reaches capacity.
    fn should_start(&self, snapshot: &SessionSnapshot) -> bool {
        snapshot.registered_players == snapshot.max_players
    }

    /// Called after a leave while the session is InProgress (and after a
    /// start that completed when everyone had already left).
    ///
    /// Default: end once the last player is gone.
    fn should_end(&self, snapshot: &SessionSnapshot) -> bool {
        snapshot.registered_players == 0
    }

    /// Called after End completes successfully.
    ///
    /// Default: keep the ended session until the host shuts down.
    fn destroy_when_ended(&self) -> bool {
        false
    }
}

/// Start when full, end when empty, destroy only at shutdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapacityPolicy;

impl LifecyclePolicy for CapacityPolicy {}

/// Never starts on its own; the game calls
/// [`start_session`](crate::SessionLifecycleManager::start_session) when
/// it is ready (a ready-check, a countdown...). Ends when empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualStartPolicy;

impl LifecyclePolicy for ManualStartPolicy {
    fn should_start(&self, _snapshot: &SessionSnapshot) -> bool {
        false
    }
}

/// Start at a fixed player count, optionally tearing the session down as
/// soon as the match ends.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdPolicy {
    pub start_at: usize,
    pub destroy_when_ended: bool,
}

impl LifecyclePolicy for ThresholdPolicy {
    fn should_start(&self, snapshot: &SessionSnapshot) -> bool {
        snapshot.registered_players >= self.start_at
    }

    fn destroy_when_ended(&self) -> bool {
        self.destroy_when_ended
    }
}
