//! A single pairing session and the per-connection membership record.

use std::fmt;
use std::sync::Arc;

use duolink_protocol::RoomCode;
use duolink_timer::TimeoutHandle;
use duolink_transport::{Connection, ConnectionId};

use crate::{ROOM_CAPACITY, RoomState};

/// How a connection entered its room. Assigned once, never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Created the room.
    Host,
    /// Joined an existing room.
    Joiner,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Joiner => write!(f, "joiner"),
        }
    }
}

/// What the registry knows about a connection that is in a room.
///
/// Kept in a side-table keyed by [`ConnectionId`] rather than on the
/// connection object, which belongs to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub code: RoomCode,
    pub role: Role,
}

/// One pairing session.
///
/// `participants` is ordered: index 0 is the longest-present participant,
/// which is the host for as long as the host stays.
pub(crate) struct Room<C> {
    pub(crate) code: RoomCode,
    pub(crate) participants: Vec<Arc<C>>,
    /// Present iff exactly one participant.
    pub(crate) pending_timeout: Option<TimeoutHandle<RoomCode>>,
}

impl<C: Connection> Room<C> {
    pub(crate) fn new(
        code: RoomCode,
        host: Arc<C>,
        pending_timeout: TimeoutHandle<RoomCode>,
    ) -> Self {
        let mut participants = Vec::with_capacity(ROOM_CAPACITY);
        participants.push(host);
        Self {
            code,
            participants,
            pending_timeout: Some(pending_timeout),
        }
    }

    pub(crate) fn state(&self) -> Option<RoomState> {
        RoomState::from_count(self.participants.len())
    }

    pub(crate) fn is_full(&self) -> bool {
        self.participants.len() >= ROOM_CAPACITY
    }

    pub(crate) fn contains(&self, id: ConnectionId) -> bool {
        self.participants.iter().any(|c| c.id() == id)
    }

    /// Removes a participant, keeping the order of the rest.
    pub(crate) fn remove(&mut self, id: ConnectionId) -> bool {
        let before = self.participants.len();
        self.participants.retain(|c| c.id() != id);
        self.participants.len() != before
    }

    /// Everyone in the room except `id`.
    pub(crate) fn peers_of(&self, id: ConnectionId) -> Vec<Arc<C>> {
        self.participants
            .iter()
            .filter(|c| c.id() != id)
            .cloned()
            .collect()
    }

    pub(crate) fn participant_ids(&self) -> Vec<ConnectionId> {
        self.participants.iter().map(|c| c.id()).collect()
    }
}
