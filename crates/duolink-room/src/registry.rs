//! Room registry: creates, pairs, and tears down rooms.
//!
//! # Concurrency note
//!
//! `RoomRegistry` is NOT thread-safe by itself. The server keeps exactly
//! one instance behind a single mutex, and every mutation goes through it:
//! create, join, disconnect, and timeout expiry.
//!
//! Join-timeouts never touch the registry from the timer task. When a timer
//! fires it only posts an [`Expired`] event; the owner applies it with
//! [`RoomRegistry::expire`] under the same mutex. `join_room` cancels and
//! clears the pending timer under that mutex too, so an event already in
//! flight carries a stale [`TimerId`] and is ignored. A join that gets the
//! lock first always wins.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use duolink_protocol::{Codec, JsonCodec, RoomCode, ServerMessage};
use duolink_timer::{TimeoutHandle, TimeoutSupervisor, TimerId};
use duolink_transport::{Connection, ConnectionId};
use tokio::sync::mpsc;

use crate::room::Room;
use crate::{Membership, Role, RoomConfig, RoomError, RoomState};

/// Sent to a lone participant whose join window elapsed.
pub const TIMEOUT_MESSAGE: &str = "No player joined in time";

/// A join-timeout that fired. Apply it with [`RoomRegistry::expire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expired {
    pub code: RoomCode,
    pub timer: TimerId,
}

/// Point-in-time counters for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Active rooms.
    pub rooms: usize,
    /// Rooms with one participant.
    pub waiting: usize,
    /// Rooms with two participants.
    pub paired: usize,
    /// Connections currently in a room.
    pub connections: usize,
    /// Join-timeouts scheduled since start.
    pub timeouts_scheduled: u64,
    /// Join-timeouts cancelled since start.
    pub timeouts_cancelled: u64,
}

/// Owns every active room and which connection is in which room.
pub struct RoomRegistry<C: Connection> {
    /// Active rooms, keyed by code. Keys are unique, so one room per code.
    rooms: HashMap<RoomCode, Room<C>>,

    /// Which room each connection is in, and as what.
    /// A connection is in at most ONE room at a time (key invariant).
    members: HashMap<ConnectionId, Membership>,

    timers: TimeoutSupervisor<RoomCode>,
    expired_tx: mpsc::UnboundedSender<Expired>,
    config: RoomConfig,
    codec: JsonCodec,
}

impl<C: Connection> RoomRegistry<C> {
    /// Creates an empty registry.
    ///
    /// The returned receiver yields fired join-timeouts; the owner must feed
    /// each one back into [`expire`](Self::expire).
    pub fn new(config: RoomConfig) -> (Self, mpsc::UnboundedReceiver<Expired>) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let registry = Self {
            rooms: HashMap::new(),
            members: HashMap::new(),
            timers: TimeoutSupervisor::new(),
            expired_tx,
            config,
            codec: JsonCodec,
        };
        (registry, expired_rx)
    }

    /// Creates a room with `conn` as its host and arms the join-timeout.
    ///
    /// # Errors
    /// - [`RoomError::InvalidCode`]: empty code
    /// - [`RoomError::AlreadyInRoom`]: `conn` is already in a room
    /// - [`RoomError::DuplicateCode`]: a room with `code` exists
    pub fn create_room(
        &mut self,
        code: RoomCode,
        conn: Arc<C>,
    ) -> Result<RoomState, RoomError> {
        if code.is_empty() {
            return Err(RoomError::InvalidCode);
        }
        let conn_id = conn.id();
        self.ensure_unassigned(conn_id)?;
        if self.rooms.contains_key(&code) {
            return Err(RoomError::DuplicateCode(code));
        }

        let timeout = arm_join_timeout(
            &mut self.timers,
            &self.expired_tx,
            &code,
            self.config.join_timeout,
        );
        self.members.insert(
            conn_id,
            Membership {
                code: code.clone(),
                role: Role::Host,
            },
        );
        self.rooms
            .insert(code.clone(), Room::new(code.clone(), conn, timeout));

        tracing::info!(%code, %conn_id, "room created");
        Ok(RoomState::Waiting)
    }

    /// Adds `conn` to the room as its second participant.
    ///
    /// Returns every participant, host first, so the caller can notify both.
    ///
    /// # Errors
    /// - [`RoomError::InvalidCode`]: empty code
    /// - [`RoomError::AlreadyInRoom`]: `conn` is already in a room
    /// - [`RoomError::NotFound`]: no room with `code`
    /// - [`RoomError::RoomFull`]: the room already has two participants
    pub fn join_room(
        &mut self,
        code: RoomCode,
        conn: Arc<C>,
    ) -> Result<Vec<Arc<C>>, RoomError> {
        if code.is_empty() {
            return Err(RoomError::InvalidCode);
        }
        let conn_id = conn.id();
        self.ensure_unassigned(conn_id)?;

        let room = self
            .rooms
            .get_mut(&code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        if room.is_full() {
            return Err(RoomError::RoomFull(code));
        }

        // Cancel before accepting: a timer event already in flight now
        // carries a stale id.
        if let Some(timeout) = room.pending_timeout.take() {
            self.timers.cancel(timeout);
        }
        room.participants.push(conn);
        let participants = room.participants.clone();

        self.members.insert(
            conn_id,
            Membership {
                code: code.clone(),
                role: Role::Joiner,
            },
        );

        tracing::info!(%code, %conn_id, players = participants.len(), "room joined");
        Ok(participants)
    }

    /// Removes a connection from whichever room it is in.
    ///
    /// Idempotent, and a no-op for connections that never joined a room.
    /// An emptied room is deleted along with its timeout. If one
    /// participant remains, the join-timeout is armed again for it.
    ///
    /// Returns the code of the room that was left, if any.
    pub fn disconnect(&mut self, conn_id: ConnectionId) -> Option<RoomCode> {
        let membership = self.members.remove(&conn_id)?;
        let code = membership.code;

        let Some(room) = self.rooms.get_mut(&code) else {
            tracing::warn!(%code, %conn_id, "member of a missing room");
            return None;
        };
        if !room.remove(conn_id) {
            tracing::warn!(%code, %conn_id, "member not listed in its room");
        }

        if room.participants.is_empty() {
            if let Some(room) = self.rooms.remove(&code) {
                if let Some(timeout) = room.pending_timeout {
                    self.timers.cancel(timeout);
                }
            }
            tracing::info!(%code, %conn_id, role = %membership.role, "room removed");
        } else {
            if let Some(old) = room.pending_timeout.take() {
                self.timers.cancel(old);
            }
            room.pending_timeout = Some(arm_join_timeout(
                &mut self.timers,
                &self.expired_tx,
                &code,
                self.config.join_timeout,
            ));
            tracing::info!(
                %code,
                %conn_id,
                role = %membership.role,
                players = room.participants.len(),
                "participant left, waiting again"
            );
        }

        Some(code)
    }

    /// The other participants in `conn_id`'s room (zero or one).
    pub fn peers_of(&self, conn_id: ConnectionId) -> Vec<Arc<C>> {
        self.members
            .get(&conn_id)
            .and_then(|m| self.rooms.get(&m.code))
            .map(|room| room.peers_of(conn_id))
            .unwrap_or_default()
    }

    /// Applies a fired join-timeout.
    ///
    /// If the room still waits on exactly this timer with one participant,
    /// that participant is sent `timeout_disconnect`, closed, and the room
    /// is deleted. Stale events (timer cancelled, room paired or gone) are
    /// ignored. Returns the closed connection.
    pub fn expire(&mut self, event: &Expired) -> Option<Arc<C>> {
        let room = self.rooms.get(&event.code)?;
        let current = room.pending_timeout.as_ref().map(TimeoutHandle::id);
        if current != Some(event.timer) || room.participants.len() != 1 {
            tracing::trace!(code = %event.code, timer = %event.timer, "stale timeout ignored");
            return None;
        }

        let room = self.rooms.remove(&event.code)?;
        let conn = room.participants.into_iter().next()?;
        let conn_id = conn.id();
        self.members.remove(&conn_id);

        let notice = ServerMessage::TimeoutDisconnect {
            message: TIMEOUT_MESSAGE.to_string(),
        };
        match self.codec.encode(&notice) {
            Ok(frame) => {
                if let Err(e) = conn.send(frame) {
                    tracing::trace!(%conn_id, error = %e, "timeout notice not delivered");
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to encode timeout notice"),
        }
        conn.close();

        tracing::info!(code = %room.code, %conn_id, "room expired waiting for a joiner");
        Some(conn)
    }

    /// The membership record for a connection, if it is in a room.
    pub fn membership(&self, conn_id: ConnectionId) -> Option<&Membership> {
        self.members.get(&conn_id)
    }

    /// The state of the room with `code`, if it exists.
    pub fn room_state(&self, code: &RoomCode) -> Option<RoomState> {
        self.rooms.get(code).and_then(Room::state)
    }

    /// Participant ids of the room with `code`, in order.
    pub fn participants(&self, code: &RoomCode) -> Option<Vec<ConnectionId>> {
        self.rooms.get(code).map(Room::participant_ids)
    }

    /// Returns `true` if the room with `code` has a join-timeout armed.
    pub fn has_pending_timeout(&self, code: &RoomCode) -> bool {
        self.rooms
            .get(code)
            .is_some_and(|room| room.pending_timeout.is_some())
    }

    /// Returns `true` if a room with `code` exists.
    pub fn contains(&self, code: &RoomCode) -> bool {
        self.rooms.contains_key(code)
    }

    /// Returns the number of active rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Counters for periodic logging.
    pub fn stats(&self) -> RegistryStats {
        let paired = self.rooms.values().filter(|r| r.is_full()).count();
        let timers = self.timers.metrics();
        RegistryStats {
            rooms: self.rooms.len(),
            waiting: self.rooms.len() - paired,
            paired,
            connections: self.members.len(),
            timeouts_scheduled: timers.scheduled,
            timeouts_cancelled: timers.cancelled,
        }
    }

    fn ensure_unassigned(&self, conn_id: ConnectionId) -> Result<(), RoomError> {
        match self.members.get(&conn_id) {
            Some(m) => Err(RoomError::AlreadyInRoom {
                conn: conn_id,
                code: m.code.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Schedules a join-timeout whose only job is to report back on `tx`.
fn arm_join_timeout(
    timers: &mut TimeoutSupervisor<RoomCode>,
    tx: &mpsc::UnboundedSender<Expired>,
    code: &RoomCode,
    delay: Duration,
) -> TimeoutHandle<RoomCode> {
    let tx = tx.clone();
    timers.schedule(code.clone(), delay, move |code, timer| {
        let _ = tx.send(Expired { code, timer });
    })
}
