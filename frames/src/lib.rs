//! Shared frame model and JSON codec for the realtime issue feed.
//!
//! This crate owns the wire representation pushed by the issue server over
//! its `/ws` socket and the single probe frame the client sends back.
//! Payloads stay flexible (`serde_json::Value`); only the envelope is typed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error returned by [`decode_frame`] and [`encode_frame`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text is not a JSON object with a string `type` field.
    #[error("failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),
    /// The outbound frame could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Frame types the issue server is known to send.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Welcome frame sent right after the socket is accepted.
    ConnectionEstablished,
    /// An issue was created by some client.
    IssueCreated,
    /// An issue changed on the server.
    IssueUpdated,
    /// An issue was removed.
    IssueDeleted,
    /// Reply to a client `ping`.
    Pong,
    /// The server failed to handle something the client sent.
    Error,
}

impl FrameType {
    /// Every recognized type, in no particular order.
    pub const ALL: [Self; 6] = [
        Self::ConnectionEstablished,
        Self::IssueCreated,
        Self::IssueUpdated,
        Self::IssueDeleted,
        Self::Pong,
        Self::Error,
    ];

    /// Wire name of the type, e.g. `"issue_updated"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionEstablished => "connection_established",
            Self::IssueCreated => "issue_created",
            Self::IssueUpdated => "issue_updated",
            Self::IssueDeleted => "issue_deleted",
            Self::Pong => "pong",
            Self::Error => "error",
        }
    }

    /// Look up a wire name. Returns `None` for types this crate does not know.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }

    /// True for the three issue change notifications.
    #[must_use]
    pub fn is_issue_event(self) -> bool {
        matches!(self, Self::IssueCreated | Self::IssueUpdated | Self::IssueDeleted)
    }
}

/// A single message received from the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InboundFrame {
    /// Event name, e.g. `"issue_created"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Event payload, absent on liveness frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Human-readable note (welcome text, error description).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Sender clock. Server pushes carry its loop time, pongs echo the ping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl InboundFrame {
    /// Recognized type of this frame, if any.
    #[must_use]
    pub fn frame_type(&self) -> Option<FrameType> {
        FrameType::parse(&self.kind)
    }
}

/// Frames the client sends to the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Liveness probe. `timestamp` is milliseconds since the Unix epoch.
    Ping { timestamp: i64 },
}

/// Decode one text message into an [`InboundFrame`].
///
/// # Errors
///
/// Returns [`CodecError::Decode`] when the text is not a JSON object with a
/// string `type` field.
pub fn decode_frame(text: &str) -> Result<InboundFrame, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Decode)
}

/// Encode an outbound frame as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode_frame(frame: &OutboundFrame) -> Result<String, CodecError> {
    serde_json::to_string(frame).map_err(CodecError::Encode)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
