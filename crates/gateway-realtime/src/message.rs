//! Wire frames and JSON envelopes exchanged with realtime clients.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use gateway_core::events::SessionEndReason;
use gateway_core::types::SessionId;

use crate::error::RealtimeError;

/// A transport-level frame, independent of the WebSocket implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text payload.
    Text(String),
    /// Binary payload.
    Binary(Vec<u8>),
    /// Liveness probe.
    Ping(Vec<u8>),
    /// Probe answer.
    Pong(Vec<u8>),
    /// Close handshake.
    Close,
}

/// A message received from a client: `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    /// Message type, used for routing.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific payload.
    #[serde(default)]
    pub payload: Value,
}

impl InboundEnvelope {
    /// Decode a data frame. Control frames are not envelopes.
    pub fn decode(frame: &Frame) -> Result<Self, RealtimeError> {
        let bytes = match frame {
            Frame::Text(text) => text.as_bytes(),
            Frame::Binary(data) => data.as_slice(),
            _ => {
                return Err(RealtimeError::MalformedEnvelope(
                    "control frame is not an envelope".to_string(),
                ));
            }
        };
        let envelope: Self = serde_json::from_slice(bytes)
            .map_err(|e| RealtimeError::MalformedEnvelope(e.to_string()))?;
        if envelope.kind.is_empty() {
            return Err(RealtimeError::MalformedEnvelope(
                "missing message type".to_string(),
            ));
        }
        Ok(envelope)
    }
}

/// A message sent to a client: `{"type": ..., "session_id": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Message type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Recipient session; stamped by the publisher when absent.
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// Type-specific payload.
    #[serde(default)]
    pub payload: Value,
}

impl OutboundMessage {
    /// Build a message with no recipient stamped yet.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            session_id: None,
            payload,
        }
    }

    /// An `error` event.
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new("error", json!({ "code": code, "message": message.into() }))
    }

    /// Answer to an application-level `ping`.
    pub fn pong(payload: Value) -> Self {
        Self::new("pong", payload)
    }

    /// Notice that the session was ended and the connection will close.
    pub fn session_terminated(
        session_id: SessionId,
        reason: SessionEndReason,
        grace_seconds: u64,
    ) -> Self {
        Self {
            kind: "session_terminated".to_string(),
            session_id: Some(session_id),
            payload: json!({ "reason": reason.as_str(), "grace_seconds": grace_seconds }),
        }
    }

    /// Serialize into a text frame.
    pub fn encode(&self) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(self).map(Frame::Text)
    }
}
