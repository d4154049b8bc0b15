//! Room configuration and state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Every room holds exactly this many participants once paired.
/// Not configurable.
pub const ROOM_CAPACITY: usize = 2;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room in a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// How long a lone participant may wait for a peer before the room is
    /// torn down.
    pub join_timeout: Duration,
}

impl RoomConfig {
    /// Default join window: ten minutes.
    pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(600);
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            join_timeout: Self::DEFAULT_JOIN_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room, derived from its participant count.
///
/// ```text
///   create ──→ Waiting ──(join)──→ Paired
///                 ↑                  │
///                 └──(one leaves)────┘
/// ```
///
/// A room with no participants doesn't exist, so there is no state for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    /// One participant, join-timeout armed.
    Waiting,
    /// Two participants, relaying.
    Paired,
}

impl RoomState {
    /// The state for a room with `count` participants, or `None` for a
    /// count no stored room can have.
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(Self::Waiting),
            ROOM_CAPACITY => Some(Self::Paired),
            _ => None,
        }
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Paired => write!(f, "Paired"),
        }
    }
}
