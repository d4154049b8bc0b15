//! Transport abstraction layer for Duolink.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the network protocol, plus the [`Frame`] type that travels across them.
//!
//! Sending is deliberately synchronous: a [`Connection`] queues outbound
//! frames for a writer task and returns immediately, so the router never
//! waits on a slow peer.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryClient, MemoryConnection};
#[cfg(feature = "websocket")]
pub use websocket::{
    PendingWebSocket, WebSocketConnection, WebSocketOptions, WebSocketTransport,
};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs across all transports.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-wide unique `ConnectionId`.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One message as it travelled on the wire.
///
/// The frame kind is preserved end to end so that opaque payloads can be
/// relayed exactly as the sender produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A UTF-8 text message.
    Text(String),
    /// A binary message.
    Binary(Vec<u8>),
}

impl Frame {
    /// Returns the raw payload bytes regardless of frame kind.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data,
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns `true` if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` for text frames.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Frame {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Frame {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(data)
    }
}

/// Accepts new incoming connections.
///
/// `accept` only takes a socket off the listener. Any per-connection setup
/// that waits on the client happens in [`Handshake::complete`], which the
/// caller runs on the connection's own task.
pub trait Transport: Send + Sync + 'static {
    /// An accepted socket that has not finished its setup yet.
    type Incoming: Handshake;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next incoming socket.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;
}

/// The second half of accepting: turns a raw socket into a [`Connection`].
pub trait Handshake: Send + 'static {
    /// The connection type produced once setup succeeds.
    type Connection: Connection;
    /// The error type for a failed or timed-out setup.
    type Error: std::error::Error + Send + Sync;

    /// Completes the setup. Bounded by the transport's handshake timeout.
    fn complete(
        self,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single live duplex channel to a client.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Queues a frame for delivery to the remote peer.
    ///
    /// Never blocks. Fails if the connection is no longer open or its
    /// outbound queue is full; the frame is then dropped.
    fn send(&self, frame: Frame) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Frame>, Self::Error>> + Send;

    /// Starts closing the connection. Frames queued before the call are
    /// still flushed; later sends fail. A pending or later `recv` returns
    /// `Ok(None)` once the peer answers or the close grace runs out.
    fn close(&self);

    /// Returns `true` while frames can still be sent.
    fn is_open(&self) -> bool;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_next_is_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b.into_inner() > a.into_inner());
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "host");
        map.insert(ConnectionId::new(2), "joiner");
        assert_eq!(map[&ConnectionId::new(1)], "host");
    }

    #[test]
    fn test_frame_bytes_for_both_kinds() {
        assert_eq!(Frame::from("hi").as_bytes(), b"hi");
        assert_eq!(Frame::from(vec![0u8, 159, 146]).as_bytes(), &[0, 159, 146]);
        assert!(Frame::from("x").is_text());
        assert!(!Frame::from(vec![1u8]).is_text());
    }

    #[test]
    fn test_frame_len_and_empty() {
        assert_eq!(Frame::from("four").len(), 4);
        assert!(Frame::Binary(Vec::new()).is_empty());
    }
}
