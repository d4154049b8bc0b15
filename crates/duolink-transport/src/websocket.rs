//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! [`WebSocketTransport::accept`] only takes the TCP socket off the
//! listener. The WebSocket upgrade runs later in
//! [`PendingWebSocket::complete`], under a deadline, so the caller can do it
//! on the connection's own task and a silent socket never stalls the accept
//! loop.
//!
//! Each upgraded socket is split in two halves. The read half stays in the
//! [`WebSocketConnection`] and is driven by [`Connection::recv`]. The write
//! half moves into a dedicated writer task fed by a bounded queue, which is
//! what makes [`Connection::send`] non-blocking: when the peer stops reading
//! and the queue fills up, further frames are refused instead of buffered.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{Connection, ConnectionId, Frame, Handshake, Transport, TransportError};

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;
type WsSink = SplitSink<WsStream, Message>;

/// Timeouts and queue sizes for WebSocket connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebSocketOptions {
    /// How long a new socket gets to complete the WebSocket upgrade.
    pub handshake_timeout: Duration,

    /// How long a closing connection waits for queued frames to flush and
    /// for the peer to answer the Close frame.
    pub close_grace: Duration,

    /// Frames that may wait for the writer before `send` refuses more.
    pub outbound_capacity: usize,
}

impl WebSocketOptions {
    pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(5);
    pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;
}

impl Default for WebSocketOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: Self::DEFAULT_HANDSHAKE_TIMEOUT,
            close_grace: Self::DEFAULT_CLOSE_GRACE,
            outbound_capacity: Self::DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    options: WebSocketOptions,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with(addr, WebSocketOptions::default()).await
    }

    /// Binds with explicit timeouts and queue size.
    pub async fn bind_with(
        addr: &str,
        options: WebSocketOptions,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener, options })
    }

    /// Returns the address the listener is actually bound to.
    ///
    /// Useful after binding to port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Incoming = PendingWebSocket;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error> {
        let (stream, peer_addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        Ok(PendingWebSocket {
            stream,
            peer_addr,
            options: self.options,
        })
    }
}

/// A TCP socket that has not finished its WebSocket upgrade yet.
pub struct PendingWebSocket {
    stream: TcpStream,
    peer_addr: SocketAddr,
    options: WebSocketOptions,
}

impl PendingWebSocket {
    /// The remote socket address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

impl Handshake for PendingWebSocket {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn complete(self) -> Result<Self::Connection, Self::Error> {
        let Self {
            stream,
            peer_addr,
            options,
        } = self;

        let upgrade = tokio_tungstenite::accept_async(stream);
        let ws = match tokio::time::timeout(options.handshake_timeout, upgrade).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                return Err(TransportError::HandshakeFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                )));
            }
            Err(_) => return Err(TransportError::HandshakeTimedOut(peer_addr)),
        };

        let id = ConnectionId::next();
        tracing::debug!(%id, %peer_addr, "accepted WebSocket connection");

        Ok(WebSocketConnection::spawn(id, peer_addr, ws, options))
    }
}

/// A single WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    reader: Mutex<SplitStream<WsStream>>,
    outbound: mpsc::Sender<Frame>,
    /// Set once by `close()` to the instant the close handshake gives up.
    closing: watch::Sender<Option<Instant>>,
    open: Arc<AtomicBool>,
    close_grace: Duration,
}

impl WebSocketConnection {
    fn spawn(
        id: ConnectionId,
        peer_addr: SocketAddr,
        ws: WsStream,
        options: WebSocketOptions,
    ) -> Self {
        let (sink, stream) = ws.split();
        let (tx, rx) = mpsc::channel(options.outbound_capacity.max(1));
        let (closing, closing_rx) = watch::channel(None);
        let open = Arc::new(AtomicBool::new(true));

        tokio::spawn(write_loop(
            id,
            sink,
            rx,
            closing_rx,
            Arc::clone(&open),
            options.close_grace,
        ));

        Self {
            id,
            peer_addr,
            reader: Mutex::new(stream),
            outbound: tx,
            closing,
            open,
            close_grace: options.close_grace,
        }
    }

    /// The remote socket address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

impl Connection for WebSocketConnection {
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
        let mut reader = self.reader.lock().await;
        let mut closing = self.closing.subscribe();
        loop {
            // Once closing, the peer only has until the deadline to answer.
            let deadline = *closing.borrow_and_update();
            let next = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, reader.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            tracing::debug!(id = %self.id, "peer did not answer close");
                            return Ok(None);
                        }
                    }
                }
                None => tokio::select! {
                    next = reader.next() => next,
                    _ = closing.changed() => continue,
                },
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Frame::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(Frame::Binary(data.to_vec())));
                }
                Some(Ok(Message::Close(_))) | None => {
                    self.open.store(false, Ordering::Release);
                    return Ok(None);
                }
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    self.open.store(false, Ordering::Release);
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            self.closing
                .send_replace(Some(Instant::now() + self.close_grace));
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.outbound.is_closed()
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Drains the outbound queue into the socket until it closes or fails.
///
/// A close request stops the loop even while a write is stalled on a peer
/// that no longer reads; what is left is flushed under the close deadline.
async fn write_loop(
    id: ConnectionId,
    mut sink: WsSink,
    mut rx: mpsc::Receiver<Frame>,
    mut closing: watch::Receiver<Option<Instant>>,
    open: Arc<AtomicBool>,
    close_grace: Duration,
) {
    loop {
        tokio::select! {
            biased;
            _ = closing.changed() => break,
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                tokio::select! {
                    biased;
                    result = sink.send(into_message(frame)) => {
                        if let Err(e) = result {
                            tracing::debug!(%id, error = %e, "write failed");
                            open.store(false, Ordering::Release);
                            rx.close();
                            return;
                        }
                    }
                    _ = closing.changed() => break,
                }
            }
        }
    }

    open.store(false, Ordering::Release);
    rx.close();
    // A connection dropped without `close()` gets the same grace.
    let deadline = closing
        .borrow()
        .unwrap_or_else(|| Instant::now() + close_grace);
    match tokio::time::timeout_at(deadline, flush_and_close(&mut sink, &mut rx)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::trace!(%id, error = %e, "close handshake failed"),
        Err(_) => tracing::debug!(%id, "close handshake timed out"),
    }
    tracing::trace!(%id, "writer stopped");
}

/// Sends whatever was queued before the close, then the Close frame.
async fn flush_and_close(
    sink: &mut WsSink,
    rx: &mut mpsc::Receiver<Frame>,
) -> Result<(), tungstenite::Error> {
    while let Ok(frame) = rx.try_recv() {
        sink.send(into_message(frame)).await?;
    }
    sink.close().await
}

fn into_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data.into()),
    }
}
