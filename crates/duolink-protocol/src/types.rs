//! Core protocol types for Duolink's wire format.
//!
//! Every message on the wire is a JSON object tagged by an `action` field:
//!
//! ```text
//! client → server   {"action":"create","code":"ABCD"}
//! server → client   {"action":"waiting","code":"ABCD"}
//! client → peer     {"action":"update_position","position":{"x":1,"y":2}}
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The caller-chosen name of a room.
///
/// Codes are compared exactly (case-sensitive, no trimming). Emptiness is
/// checked by the registry, not here, so that an empty code can still be
/// carried far enough to produce the right error.
///
/// `#[serde(transparent)]` keeps it a plain JSON string on the wire.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Wraps a code as given by the client.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty code, which no room may use.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ServerMessage: what the server itself says
// ---------------------------------------------------------------------------

/// Messages originated by the server.
///
/// `#[serde(tag = "action", rename_all = "snake_case")]` produces
/// internally tagged JSON, so `TimeoutDisconnect { message }` becomes
/// `{"action":"timeout_disconnect","message":"..."}`. That is exactly the
/// shape clients already switch on for their own messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to a successful `create`: the room exists, waiting for a peer.
    Waiting { code: RoomCode },

    /// Sent to both participants once the second one has joined.
    Connected { code: RoomCode },

    /// A client-attributable failure. The connection stays open.
    Error { message: String },

    /// The join window elapsed with nobody joining. The server closes the
    /// connection right after sending this.
    TimeoutDisconnect { message: String },
}

// ---------------------------------------------------------------------------
// RelayActions: which actions are forwarded to the peer
// ---------------------------------------------------------------------------

/// The default relay action.
pub const UPDATE_POSITION: &str = "update_position";

/// The set of structured actions that are relayed to the peer rather than
/// handled by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayActions(BTreeSet<String>);

impl RelayActions {
    /// Builds a set from action names. `create` and `join` are ignored:
    /// control actions always win.
    pub fn new<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            actions
                .into_iter()
                .map(Into::into)
                .filter(|a| a != crate::CREATE && a != crate::JOIN)
                .collect(),
        )
    }

    /// Returns `true` if `action` should be relayed.
    pub fn contains(&self, action: &str) -> bool {
        self.0.contains(action)
    }

    /// Iterates the configured actions in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for RelayActions {
    fn default() -> Self {
        Self::new([UPDATE_POSITION])
    }
}

// =========================================================================
// Tests
// =========================================================================
