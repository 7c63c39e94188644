//! One-shot completion notifications.
//!
//! Every backend request is answered twice: once synchronously (accepted or
//! rejected) and, if accepted, once more later through a completion
//! notification. This module holds the notification side:
//!
//! - [`Completion`] / [`LoginCompletion`]: the payloads the backend delivers
//! - [`BackendEvent`]: the single channel item the host receives
//! - [`CompletionRegistry`]: the subscription table, one slot per key
//!
//! # Subscription protocol
//!
//! ```text
//! subscribe(key) ──→ token ──→ issue request
//!                                  │
//!                  rejected ◄──────┤──────► accepted
//!                     │                        │
//!             unsubscribe(token)        completion arrives
//!                                              │
//!                                   handle, then unsubscribe(token)
//! ```
//!
//! A key can hold at most one subscription. A completion that arrives for a
//! key with no active subscription is stale and must be ignored; this is how
//! a notification is kept from being handled twice.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::{BackendError, PlayerId, SessionName, UserSlot};

// ---------------------------------------------------------------------------
// Operation kinds
// ---------------------------------------------------------------------------

/// The six asynchronous session operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    Create,
    Register,
    Unregister,
    Start,
    End,
    Destroy,
}

impl OperationKind {
    /// All kinds, in lifecycle order.
    pub const ALL: [OperationKind; 6] = [
        Self::Create,
        Self::Register,
        Self::Unregister,
        Self::Start,
        Self::End,
        Self::Destroy,
    ];
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Register => "register",
            Self::Unregister => "unregister",
            Self::Start => "start",
            Self::End => "end",
            Self::Destroy => "destroy",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Completion of a session operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub kind: OperationKind,
    pub session: SessionName,
    pub success: bool,
    /// Players affected by a register/unregister. Empty for other kinds.
    pub players: Vec<PlayerId>,
}

impl Completion {
    /// A completion with no player payload.
    pub fn new(kind: OperationKind, session: SessionName, success: bool) -> Self {
        Self {
            kind,
            session,
            success,
            players: Vec::new(),
        }
    }

    /// Attaches the affected players.
    pub fn with_players(mut self, players: Vec<PlayerId>) -> Self {
        self.players = players;
        self
    }
}

/// Completion of a login or auto-login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCompletion {
    pub slot: UserSlot,
    pub success: bool,
    /// The identity the backend assigned, if login succeeded.
    pub identity: Option<PlayerId>,
    /// Backend error text. Empty on success.
    pub error: String,
}

/// Anything the backend delivers back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Session(Completion),
    Login(LoginCompletion),
}

/// Sending half the backend uses to deliver notifications.
pub type EventSender = mpsc::UnboundedSender<BackendEvent>;

/// Receiving half the host drains.
pub type EventReceiver = mpsc::UnboundedReceiver<BackendEvent>;

/// Creates a new notification channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Opaque handle for an active subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// An active subscription plus the context stored alongside it.
///
/// `issued_at` uses Tokio's clock so timeouts follow a paused test clock.
#[derive(Debug)]
pub struct Pending<T> {
    pub token: SubscriptionToken,
    pub issued_at: Instant,
    pub context: T,
}

/// Subscription table with at most one active subscription per key.
///
/// `K` is what completions are routed by (an [`OperationKind`], a
/// [`UserSlot`]). `T` is caller context kept with the subscription, such
/// as the state to roll back to if the operation fails.
///
/// The registry counts every subscribe and every successful unsubscribe, so
/// callers and tests can check that nothing leaked: once all operations
/// have settled, `subscribed() == released()`.
#[derive(Debug)]
pub struct CompletionRegistry<K, T = ()> {
    next_token: u64,
    active: HashMap<K, Pending<T>>,
    subscribed: u64,
    released: u64,
}

impl<K, T> CompletionRegistry<K, T>
where
    K: Copy + Eq + Hash + fmt::Display,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            next_token: 1,
            active: HashMap::new(),
            subscribed: 0,
            released: 0,
        }
    }

    /// Subscribes to the next completion for `key`.
    ///
    /// # Errors
    /// [`BackendError::AlreadySubscribed`] if `key` already has an active
    /// subscription. The existing one is left untouched.
    pub fn subscribe(&mut self, key: K, context: T) -> Result<SubscriptionToken, BackendError> {
        if self.active.contains_key(&key) {
            return Err(BackendError::AlreadySubscribed(key.to_string()));
        }
        let token = SubscriptionToken(self.next_token);
        self.next_token += 1;
        self.active.insert(
            key,
            Pending {
                token,
                issued_at: Instant::now(),
                context,
            },
        );
        self.subscribed += 1;
        tracing::trace!(%key, %token, "subscribed");
        Ok(token)
    }

    /// Removes the subscription that `token` refers to and returns its
    /// context.
    ///
    /// Returns `None` if the token is not active, which means it was
    /// already released; nothing is counted in that case.
    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> Option<T> {
        let key = self
            .active
            .iter()
            .find(|(_, pending)| pending.token == token)
            .map(|(key, _)| *key)?;
        let pending = self.active.remove(&key)?;
        self.released += 1;
        tracing::trace!(%key, %token, "unsubscribed");
        Some(pending.context)
    }

    /// Returns the active subscription for `key`, if any.
    pub fn get(&self, key: &K) -> Option<&Pending<T>> {
        self.active.get(key)
    }

    /// Returns the active token for `key`, if any.
    pub fn token(&self, key: &K) -> Option<SubscriptionToken> {
        self.active.get(key).map(|p| p.token)
    }

    /// Returns `true` if `key` has an active subscription.
    pub fn is_active(&self, key: &K) -> bool {
        self.active.contains_key(key)
    }

    /// Keys whose subscription has been open for at least `timeout`.
    pub fn overdue(&self, timeout: Duration) -> Vec<K> {
        self.active
            .iter()
            .filter(|(_, pending)| pending.issued_at.elapsed() >= timeout)
            .map(|(key, _)| *key)
            .collect()
    }

    /// Tokens of every active subscription.
    pub fn tokens(&self) -> Vec<SubscriptionToken> {
        self.active.values().map(|p| p.token).collect()
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Returns `true` if nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Total subscriptions ever opened.
    pub fn subscribed(&self) -> u64 {
        self.subscribed
    }

    /// Total subscriptions ever released.
    pub fn released(&self) -> u64 {
        self.released
    }
}

impl<K, T> Default for CompletionRegistry<K, T>
where
    K: Copy + Eq + Hash + fmt::Display,
{
    fn default() -> Self {
        Self::new()
    }
}
