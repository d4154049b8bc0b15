//! Wire protocol for Duolink.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Types** ([`ServerMessage`], [`RoomCode`], [`RelayActions`]):
//!   the message structures that travel on the wire.
//! - **Classification** ([`Inbound`]): what an inbound frame asks for.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how messages become
//!   frames.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (frames) and the room layer.
//! It doesn't know about connections or rooms.
//!
//! ```text
//! Transport (Frame) → Protocol (Inbound) → Router → Room registry
//! ```

mod codec;
mod error;
mod inbound;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use inbound::{CREATE, Inbound, JOIN};
pub use types::{RelayActions, RoomCode, ServerMessage, UPDATE_POSITION};
