//! Shared wire model for the Crewdeck chat transport.
//!
//! This crate owns the representations that cross process boundaries: the
//! JSON text frames spoken on the persistent channel, the chat message
//! payload shared by the history feed and the push stream, and the topic
//! naming scheme that partitions traffic by room.
//!
//! DESIGN
//! ======
//! - One `ChatMessage` type for both delivery paths. History entries and
//!   push events must decode to the identical shape, otherwise dedup-by-id
//!   falls apart; a field rename here updates both decoders at once.
//! - Frames keep payloads flexible (`serde_json::Value`) and carry a
//!   client-generated id so log lines on either end can be correlated.
//! - Timestamps arrive as ISO-8601 strings, with or without a UTC offset;
//!   offset-less values are taken as UTC.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

// =============================================================================
// ERRORS
// =============================================================================

/// Error returned by the frame and payload decoders.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text could not be decoded as a known frame or payload shape.
    #[error("failed to decode wire value: {0}")]
    Json(#[from] serde_json::Error),
    /// A `createdAt` string is not a recognizable ISO-8601 timestamp.
    #[error("invalid ISO-8601 timestamp: {0}")]
    Timestamp(String),
}

// =============================================================================
// ROOMS & TOPICS
// =============================================================================

/// Server-assigned identifier of one chat room.
///
/// All messages and subscriptions are partitioned by room; the channel
/// topics below are the only places the id appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub i64);

impl RoomId {
    /// Inbound topic carrying push events for this room.
    #[must_use]
    pub fn topic(self) -> String {
        format!("chat.{}", self.0)
    }

    /// Outbound destination accepting message publishes for this room.
    #[must_use]
    pub fn send_destination(self) -> String {
        format!("chat.{}.send", self.0)
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// CHAT PAYLOADS
// =============================================================================

/// A single chat message, exactly as the server broadcasts it.
///
/// Immutable once created. `id` is unique within a room and assigned by the
/// server in send order, which makes it both the dedup key and the
/// tie-breaker when two messages share a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    pub sender_display_name: String,
    pub content: String,
    #[serde(with = "iso8601")]
    pub created_at: OffsetDateTime,
}

impl ChatMessage {
    /// Whether two messages fall on the same calendar day (UTC).
    ///
    /// Presentation layers use this for day-separator grouping.
    #[must_use]
    pub fn same_calendar_day(&self, other: &ChatMessage) -> bool {
        self.created_at.date() == other.created_at.date()
    }
}

/// Chat room metadata returned by the room lookup endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
}

/// Decode a chat message payload from a JSON value.
///
/// Used by the history decoder and the channel decoder alike.
///
/// # Errors
///
/// Returns [`CodecError`] when the value does not match the payload shape.
pub fn decode_message(value: &Value) -> Result<ChatMessage, CodecError> {
    Ok(serde_json::from_value(value.clone())?)
}

// =============================================================================
// CHANNEL FRAMES
// =============================================================================

/// Operation carried by a channel frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    /// Client handshake; `data` carries the bearer token.
    Connect,
    /// Server acknowledgment of a successful handshake.
    Connected,
    /// Client request to receive events for `topic`.
    Subscribe,
    /// Client message publish; `topic` is a send destination and `data`
    /// carries the content.
    Publish,
    /// Server push event; `topic` names the room topic and `data` is a
    /// [`ChatMessage`] payload.
    Event,
    /// Server-reported failure; `data` carries a human-readable message.
    Error,
}

/// A single message on the persistent channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Client- or server-generated identifier (UUID string), for log
    /// correlation only. No reply is ever keyed on it.
    pub id: String,
    pub op: Op,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    fn new(op: Op, topic: Option<String>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            op,
            topic,
            data,
        }
    }

    /// Handshake frame carrying the bearer token.
    #[must_use]
    pub fn connect(token: &str) -> Self {
        Self::new(Op::Connect, None, serde_json::json!({ "token": token }))
    }

    /// Handshake acknowledgment.
    #[must_use]
    pub fn connected() -> Self {
        Self::new(Op::Connected, None, Value::Null)
    }

    /// Subscription request for a room topic.
    #[must_use]
    pub fn subscribe(topic: impl Into<String>) -> Self {
        Self::new(Op::Subscribe, Some(topic.into()), Value::Null)
    }

    /// Message publish to a room's send destination.
    #[must_use]
    pub fn publish(destination: impl Into<String>, content: &str) -> Self {
        Self::new(
            Op::Publish,
            Some(destination.into()),
            serde_json::json!({ "content": content }),
        )
    }

    /// Push event delivering a chat message payload on a room topic.
    #[must_use]
    pub fn event(topic: impl Into<String>, payload: Value) -> Self {
        Self::new(Op::Event, Some(topic.into()), payload)
    }

    /// Server error frame.
    #[must_use]
    pub fn error(message: &str) -> Self {
        Self::new(Op::Error, None, serde_json::json!({ "message": message }))
    }

    /// Human-readable message of an error frame, if present.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.data.get("message").and_then(Value::as_str)
    }

    /// Text content of a publish frame, if present.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.data.get("content").and_then(Value::as_str)
    }

    /// Bearer token of a connect frame, if present.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.data.get("token").and_then(Value::as_str)
    }
}

/// Encode a frame as a JSON text payload.
#[must_use]
pub fn encode_frame(frame: &Frame) -> String {
    // Serialization of this shape cannot fail: keys are strings and every
    // field type is JSON-representable.
    serde_json::to_string(frame).unwrap_or_default()
}

/// Decode a JSON text payload into a frame.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed text or unknown operations.
pub fn decode_frame(text: &str) -> Result<Frame, CodecError> {
    Ok(serde_json::from_str(text)?)
}

// =============================================================================
// TIMESTAMPS
// =============================================================================

/// Parse an ISO-8601 timestamp, accepting both offset and offset-less forms.
///
/// Offset-less values (the collaborator's local-datetime serialization) are
/// assumed to be UTC.
///
/// # Errors
///
/// Returns [`CodecError::Timestamp`] when neither form parses.
pub fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, CodecError> {
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(parsed);
    }
    PrimitiveDateTime::parse(raw, &Iso8601::DEFAULT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|_| CodecError::Timestamp(raw.to_owned()))
}

/// Serde adapter for `createdAt` wire timestamps.
pub mod iso8601 {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    /// Serialize a timestamp as an RFC 3339 string.
    ///
    /// # Errors
    ///
    /// Propagates formatting failures as serializer errors.
    pub fn serialize<S: Serializer>(
        value: &OffsetDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let rendered = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&rendered)
    }

    /// Deserialize a timestamp from any accepted ISO-8601 string form.
    ///
    /// # Errors
    ///
    /// Rejects values that parse as neither RFC 3339 nor offset-less
    /// ISO-8601.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
