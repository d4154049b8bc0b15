//! Error types for the room layer.
//!
//! The display text of each variant is sent verbatim to the client in an
//! `error` reply, so it is phrased for players, not operators.

use duolink_protocol::RoomCode;
use duolink_transport::ConnectionId;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room code was missing or empty.
    #[error("Missing room code")]
    InvalidCode,

    /// A room with this code already exists.
    #[error("Room code exists")]
    DuplicateCode(RoomCode),

    /// No room with this code exists.
    #[error("Room not found")]
    NotFound(RoomCode),

    /// The room already has both participants.
    #[error("Room full")]
    RoomFull(RoomCode),

    /// The connection already belongs to a room.
    #[error("Already in a room")]
    AlreadyInRoom {
        conn: ConnectionId,
        code: RoomCode,
    },
}
