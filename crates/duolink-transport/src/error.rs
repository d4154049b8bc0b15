/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection is closed; nothing more can be sent on it.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The peer is not reading and the outbound queue is full.
    #[error("outbound queue full: {0}")]
    Backpressure(String),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting a socket failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The client sent a bad upgrade request.
    #[error("handshake failed: {0}")]
    HandshakeFailed(#[source] std::io::Error),

    /// The client did not finish the upgrade in time.
    #[error("handshake timed out: {0}")]
    HandshakeTimedOut(std::net::SocketAddr),
}
