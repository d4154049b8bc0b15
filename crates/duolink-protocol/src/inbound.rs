//! Classification of inbound frames.
//!
//! A frame is either a structured envelope (a JSON object with a string
//! `action` field) or an opaque payload. [`Inbound::classify`] turns every
//! frame into exactly one [`Inbound`] variant so the router can dispatch
//! with a single exhaustive `match`.

use duolink_transport::Frame;
use serde_json::{Map, Value};

use crate::{RelayActions, RoomCode};

/// Action name for creating a room.
pub const CREATE: &str = "create";

/// Action name for joining a room.
pub const JOIN: &str = "join";

/// What a single inbound frame asks the server to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// `{"action":"create","code":...}`. `code` is `None` when missing or
    /// not a string.
    Create { code: Option<RoomCode> },

    /// `{"action":"join","code":...}`.
    Join { code: Option<RoomCode> },

    /// A structured message to forward to the peer. The router sends the
    /// original frame, so field order and number precision survive.
    Relay { action: String },

    /// A structured envelope whose action is neither control nor relay.
    Unknown { action: String },

    /// Not a structured envelope. Forwarded byte-for-byte if the sender is
    /// paired.
    Raw,
}

impl Inbound {
    /// Classifies a frame. Text and binary frames are treated alike.
    pub fn classify(frame: &Frame, relay_actions: &RelayActions) -> Self {
        let Ok(Value::Object(mut fields)) =
            serde_json::from_slice::<Value>(frame.as_bytes())
        else {
            return Self::Raw;
        };

        let action = match fields.remove("action") {
            Some(Value::String(action)) => action,
            _ => return Self::Raw,
        };

        match action.as_str() {
            CREATE => Self::Create {
                code: code_field(&fields),
            },
            JOIN => Self::Join {
                code: code_field(&fields),
            },
            relay if relay_actions.contains(relay) => Self::Relay { action },
            _ => Self::Unknown { action },
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Join { .. } => "join",
            Self::Relay { .. } => "relay",
            Self::Unknown { .. } => "unknown",
            Self::Raw => "raw",
        }
    }
}

fn code_field(fields: &Map<String, Value>) -> Option<RoomCode> {
    fields
        .get("code")
        .and_then(Value::as_str)
        .map(RoomCode::new)
}
