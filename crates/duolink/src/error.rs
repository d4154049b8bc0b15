//! Unified error type for the Duolink server.

use duolink_protocol::ProtocolError;
use duolink_room::RoomError;
use duolink_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DuolinkError {
    /// A transport-level error (bind, accept, closed connection).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, unknown action).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (duplicate code, not found, full).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Invalid server configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Reading the bound address failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
