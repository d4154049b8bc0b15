//! Codec trait and implementations for serializing server messages.
//!
//! A codec turns the server's own messages into transport [`Frame`]s. The
//! router only talks to the [`Codec`] trait, so the wire format can change
//! without touching routing code. Relayed client frames never pass through
//! a codec; they are forwarded as received.
//!
//! Currently we provide [`JsonCodec`], which matches what browser clients
//! expect: JSON text frames.

use duolink_transport::Frame;
use serde::Serialize;

use crate::ProtocolError;

/// A codec that encodes outbound messages into frames.
///
/// `Send + Sync + 'static` because the codec lives in shared server state
/// that every connection task reads from.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a frame ready to send.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Frame, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`) and emits text frames.
///
/// ## Example
///
/// ```rust
/// use duolink_protocol::{Codec, JsonCodec, RoomCode, ServerMessage};
/// use duolink_transport::Frame;
///
/// let codec = JsonCodec;
/// let frame = codec
///     .encode(&ServerMessage::Waiting { code: RoomCode::new("ABCD") })
///     .unwrap();
/// assert_eq!(frame, Frame::from(r#"{"action":"waiting","code":"ABCD"}"#));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Frame, ProtocolError> {
        serde_json::to_string(value)
            .map(Frame::Text)
            .map_err(ProtocolError::Encode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServerMessage;

    #[test]
    fn test_json_codec_encodes_text_frames() {
        let frame = JsonCodec
            .encode(&ServerMessage::Error {
                message: "Room full".into(),
            })
            .unwrap();
        assert!(frame.is_text());
        let value: serde_json::Value =
            serde_json::from_slice(frame.as_bytes()).unwrap();
        assert_eq!(value["action"], "error");
        assert_eq!(value["message"], "Room full");
    }
}
