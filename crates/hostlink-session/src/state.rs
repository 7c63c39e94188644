//! Lifecycle states, player registration records, and snapshots.

use std::fmt;

use hostlink_backend::{OperationKind, SessionName};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The host's view of its session.
///
/// ```text
/// NonExistent → Creating → Created → Starting → InProgress → Ending → Ended
///      ↑                                                               │
///      └──────────────────────── Destroying ◄──────────────────────────┘
/// ```
///
/// Destroying can be entered from any state once a session exists (or is
/// being created), because shutdown must never leave an orphaned session
/// on the backend. A failed operation returns to the stable state it was
/// issued from.
///
/// - **Creating / Starting / Ending / Destroying** are transitional: a
///   request is in flight and its completion has not arrived.
/// - **Created**: advertised and accepting registrations.
/// - **InProgress**: the match is running, no further joins.
/// - **Ended**: the match is over; the session still exists until destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    NonExistent,
    Creating,
    Created,
    Starting,
    InProgress,
    Ending,
    Ended,
    Destroying,
}

impl SessionState {
    /// Returns `true` while a lifecycle request is waiting for completion.
    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            Self::Creating | Self::Starting | Self::Ending | Self::Destroying
        )
    }

    /// Returns `true` once creation has succeeded and until destruction
    /// has succeeded.
    pub fn exists(&self) -> bool {
        !matches!(self, Self::NonExistent | Self::Creating)
    }

    /// The lifecycle operation in flight in this state, if any.
    pub fn in_flight(&self) -> Option<OperationKind> {
        match self {
            Self::Creating => Some(OperationKind::Create),
            Self::Starting => Some(OperationKind::Start),
            Self::Ending => Some(OperationKind::End),
            Self::Destroying => Some(OperationKind::Destroy),
            _ => None,
        }
    }

    /// The state a request issued from here leads to while it is pending.
    pub fn transitional_for(kind: OperationKind) -> Option<Self> {
        match kind {
            OperationKind::Create => Some(Self::Creating),
            OperationKind::Start => Some(Self::Starting),
            OperationKind::End => Some(Self::Ending),
            OperationKind::Destroy => Some(Self::Destroying),
            OperationKind::Register | OperationKind::Unregister => None,
        }
    }

    /// The stable state to fall back to if the request in flight here is
    /// abandoned.
    pub fn stable(self) -> Self {
        match self {
            Self::Creating => Self::NonExistent,
            Self::Starting => Self::Created,
            Self::Ending => Self::InProgress,
            other => other,
        }
    }

    /// Returns `true` if a player joining now can be registered (or queued
    /// for registration).
    pub fn accepts_joins(&self, allow_join_in_progress: bool) -> bool {
        match self {
            Self::NonExistent | Self::Creating | Self::Created => true,
            Self::Starting | Self::InProgress => allow_join_in_progress,
            Self::Ending | Self::Ended | Self::Destroying => false,
        }
    }

    /// Returns `true` if a registration request may be sent right now.
    pub fn can_register(&self, allow_join_in_progress: bool) -> bool {
        match self {
            Self::Created => true,
            Self::InProgress => allow_join_in_progress,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonExistent => write!(f, "NonExistent"),
            Self::Creating => write!(f, "Creating"),
            Self::Created => write!(f, "Created"),
            Self::Starting => write!(f, "Starting"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Ending => write!(f, "Ending"),
            Self::Ended => write!(f, "Ended"),
            Self::Destroying => write!(f, "Destroying"),
        }
    }
}

// ---------------------------------------------------------------------------
// RegistrationStatus
// ---------------------------------------------------------------------------

/// Where a connected player stands with the backend.
///
/// ```text
/// join ──→ Pending ──(register ok)──→ Registered ──(leave)──→ Unregistered
///             │                                                    │
///             └──(leave before register completes)────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationStatus {
    /// Joined; registration queued or in flight.
    Pending,
    /// The backend confirmed the registration. Counted in the session.
    Registered,
    /// Left; unregistration queued or in flight.
    Unregistered,
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// A read-only view of the session, handed to policies and callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub name: SessionName,
    pub state: SessionState,
    /// Players the backend has confirmed.
    pub registered_players: usize,
    pub max_players: usize,
    /// Operation kinds waiting for a completion.
    pub pending: Vec<OperationKind>,
}

impl SessionSnapshot {
    /// Returns `true` if an operation of `kind` is waiting for completion.
    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.pending.contains(&kind)
    }

    /// Returns `true` if every slot is taken by a registered player.
    pub fn is_full(&self) -> bool {
        self.registered_players >= self.max_players
    }
}
