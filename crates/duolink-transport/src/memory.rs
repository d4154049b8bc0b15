//! In-process connection backed by channels.
//!
//! [`MemoryConnection::pair`] returns the server side (which implements
//! [`Connection`]) and a [`MemoryClient`] that plays the remote peer. Used to
//! drive the router and registry without sockets.
//!
//! Like the WebSocket transport, the server-to-client queue is bounded: a
//! client that stops reading makes `send` fail with
//! [`TransportError::Backpressure`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};

use crate::{Connection, ConnectionId, Frame, TransportError};

/// Server side of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    inbound: Mutex<mpsc::UnboundedReceiver<Frame>>,
    outbound: mpsc::Sender<Frame>,
    open: Arc<AtomicBool>,
}

/// Client side of an in-memory connection.
pub struct MemoryClient {
    id: ConnectionId,
    outbound: Option<mpsc::UnboundedSender<Frame>>,
    inbound: mpsc::Receiver<Frame>,
    open: Arc<AtomicBool>,
}

impl MemoryConnection {
    /// Frames the client may leave unread before `send` refuses more.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Creates a connected (server, client) pair with a fresh id.
    pub fn pair() -> (Self, MemoryClient) {
        Self::pair_with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Like [`pair`](Self::pair), with room for `capacity` unread frames.
    pub fn pair_with_capacity(capacity: usize) -> (Self, MemoryClient) {
        let id = ConnectionId::next();
        let (to_server, from_client) = mpsc::unbounded_channel();
        let (to_client, from_server) = mpsc::channel(capacity.max(1));
        let open = Arc::new(AtomicBool::new(true));

        let server = Self {
            id,
            inbound: Mutex::new(from_client),
            outbound: to_client,
            open: Arc::clone(&open),
        };
        let client = MemoryClient {
            id,
            outbound: Some(to_server),
            inbound: from_server,
            open,
        };
        (server, client)
    }
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    fn send(&self, frame: Frame) -> Result<(), Self::Error> {
        if !self.is_open() {
            return Err(TransportError::ConnectionClosed(self.id.to_string()));
        }
        self.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Backpressure(self.id.to_string()),
            TrySendError::Closed(_) => {
                TransportError::ConnectionClosed(self.id.to_string())
            }
        })
    }

    async fn recv(&self) -> Result<Option<Frame>, Self::Error> {
        Ok(self.inbound.lock().await.recv().await)
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.outbound.is_closed()
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

impl MemoryClient {
    /// The id of the server side of this pair.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sends a frame to the server side. Returns `false` once disconnected.
    pub fn send(&self, frame: impl Into<Frame>) -> bool {
        match &self.outbound {
            Some(tx) => tx.send(frame.into()).is_ok(),
            None => false,
        }
    }

    /// Waits for the next frame from the server.
    ///
    /// Returns `None` once the server side is dropped and drained.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.inbound.recv().await
    }

    /// Returns a frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.inbound.try_recv().ok()
    }

    /// Drops the client's sending half, which the server sees as a clean
    /// close on its next `recv`.
    pub fn disconnect(&mut self) {
        self.outbound = None;
    }

    /// Returns `true` once the server side has closed the connection.
    pub fn is_closed_by_server(&self) -> bool {
        !self.open.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_both_ways() {
        let (server, mut client) = MemoryConnection::pair();
        assert_eq!(server.id(), client.id());

        assert!(client.send("ping"));
        let got = server.recv().await.unwrap();
        assert_eq!(got, Some(Frame::from("ping")));

        server.send(Frame::from(vec![1u8, 2, 3])).unwrap();
        assert_eq!(client.recv().await, Some(Frame::Binary(vec![1, 2, 3])));
    }

    #[tokio::test]
    async fn test_client_disconnect_reads_as_clean_close() {
        let (server, mut client) = MemoryConnection::pair();
        client.disconnect();
        assert_eq!(server.recv().await.unwrap(), None);
        assert!(!client.send("late"));
    }

    #[test]
    fn test_close_stops_sends() {
        let (server, client) = MemoryConnection::pair();
        server.close();
        assert!(!server.is_open());
        assert!(client.is_closed_by_server());
        assert!(matches!(
            server.send(Frame::from("x")),
            Err(TransportError::ConnectionClosed(_))
        ));
    }

    #[test]
    fn test_full_queue_refuses_without_closing() {
        let (server, mut client) = MemoryConnection::pair_with_capacity(2);
        server.send(Frame::from("1")).unwrap();
        server.send(Frame::from("2")).unwrap();
        assert!(matches!(
            server.send(Frame::from("3")),
            Err(TransportError::Backpressure(_))
        ));
        assert!(server.is_open());

        assert_eq!(client.try_recv(), Some(Frame::from("1")));
        server.send(Frame::from("4")).unwrap();
        assert_eq!(client.try_recv(), Some(Frame::from("2")));
        assert_eq!(client.try_recv(), Some(Frame::from("4")));
    }

    #[test]
    fn test_dropped_client_means_not_open() {
        let (server, client) = MemoryConnection::pair();
        drop(client);
        assert!(!server.is_open());
    }
}
