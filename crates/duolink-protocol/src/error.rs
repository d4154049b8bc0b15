//! Error types for the protocol layer.
//!
//! Each crate in Duolink defines its own error enum, so a `ProtocolError`
//! always means a problem with message shape, never with networking or
//! room bookkeeping.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// A structured envelope named an action the server doesn't know.
    ///
    /// The display text is what the client sees in its `error` reply.
    #[error("Unknown action")]
    UnknownAction(String),
}
