//! Two-player room registry for Duolink.
//!
//! Rooms are named by a client-chosen [`RoomCode`](duolink_protocol::RoomCode)
//! and hold at most two connections: the host that created the room and
//! the joiner that paired with it.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates, pairs, and tears down rooms
//! - [`Expired`]: a fired join-timeout, fed back into the registry
//! - [`RoomState`]: `Waiting` or `Paired`
//! - [`RoomConfig`]: join-timeout settings
//! - [`Membership`] / [`Role`]: which room a connection is in, and as what

mod config;
mod error;
mod registry;
mod room;

pub use config::{ROOM_CAPACITY, RoomConfig, RoomState};
pub use error::RoomError;
pub use registry::{Expired, RegistryStats, RoomRegistry, TIMEOUT_MESSAGE};
pub use room::{Membership, Role};
