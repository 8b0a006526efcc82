//! Wire protocol for the relay connection.
//!
//! Outbound frames report local pointer state and box toggles; inbound frames
//! are relayed positions tagged with the originating source.

use serde::{Deserialize, Serialize};

use crate::error::InboundError;
use crate::presence::{PresenceEntry, Position};

/// Value carried in `additionalData` when nothing else is configured.
pub const DEFAULT_ADDITIONAL_DATA: &str = "exampleData";

/// Status value the relay uses to mark a valid relayed position.
pub const SUCCESS_STATUS: &str = "success";

/// Outbound frame shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "mousemove")]
    MouseMove {
        x: i32,
        y: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<u32>,
        #[serde(rename = "additionalData")]
        additional_data: String,
    },
    #[serde(rename = "boxclick")]
    BoxClick {
        index: u32,
        #[serde(rename = "additionalData")]
        additional_data: String,
    },
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::MouseMove { .. } => "mousemove",
            OutboundMessage::BoxClick { .. } => "boxclick",
        }
    }

    /// Encode for the given wire format.
    ///
    /// Returns `Ok(None)` when the format has no representation for the
    /// message (legacy peers never receive box clicks).
    pub fn encode(&self, format: WireFormat) -> Result<Option<String>, serde_json::Error> {
        match (format, self) {
            (WireFormat::Tagged, msg) => serde_json::to_string(msg).map(Some),
            (WireFormat::Legacy, OutboundMessage::MouseMove { x, y, .. }) => {
                serde_json::to_string(&LegacyPointer { x: *x, y: *y }).map(Some)
            }
            (WireFormat::Legacy, OutboundMessage::BoxClick { .. }) => Ok(None),
        }
    }
}

/// Which outbound frame layout the relay expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// `{"type": ..., "additionalData": ...}` frames
    #[default]
    Tagged,
    /// Bare `{"x", "y"}` pointer frames, no box clicks
    Legacy,
}

#[derive(Serialize)]
struct LegacyPointer {
    x: i32,
    y: i32,
}

/// A decoded relayed position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceUpdate {
    /// Position tagged with its source; keyed into the table
    Sourced(PresenceEntry),
    /// Position without a source (legacy relays)
    Anonymous(Position),
}

#[derive(Deserialize)]
struct RelayedFrame {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    x: Option<i32>,
    #[serde(default)]
    y: Option<i32>,
    #[serde(default)]
    source: Option<String>,
}

/// Decode one inbound text frame.
///
/// `accept_anonymous` admits success frames without a source as
/// [`PresenceUpdate::Anonymous`]; otherwise they are rejected.
pub fn decode_relayed(text: &str, accept_anonymous: bool) -> Result<PresenceUpdate, InboundError> {
    // objects only; a positional array must not decode as a frame
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)?;
    let frame: RelayedFrame = serde_json::from_value(serde_json::Value::Object(object))?;

    let (x, y) = match (frame.status.as_deref(), frame.x, frame.y) {
        (Some(SUCCESS_STATUS), Some(x), Some(y)) => (x, y),
        _ => {
            return Err(InboundError::UnexpectedFormat {
                status: frame.status,
            });
        }
    };

    match frame.source {
        Some(source) if !source.is_empty() => {
            Ok(PresenceUpdate::Sourced(PresenceEntry { x, y, source }))
        }
        _ if accept_anonymous => Ok(PresenceUpdate::Anonymous(Position { x, y })),
        _ => Err(InboundError::MissingSource),
    }
}
