//! Turns connection-level errors into client-facing events.

use tracing::warn;

use gateway_core::types::SessionId;

use crate::error::RealtimeError;
use crate::message::OutboundMessage;

/// Decides what, if anything, a client is told about an error.
pub trait ErrorHandler: Send + Sync + 'static {
    /// Build the event to publish to the session, or `None` to stay silent.
    fn handle(&self, session_id: SessionId, error: &RealtimeError) -> Option<OutboundMessage>;
}

/// Reports client mistakes by code and everything else as `internal_error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, session_id: SessionId, error: &RealtimeError) -> Option<OutboundMessage> {
        warn!(%session_id, code = error.code(), error = %error, "Realtime message failed");
        let event = match error {
            RealtimeError::MalformedEnvelope(_) | RealtimeError::UnknownMessageType(_) => {
                OutboundMessage::error(error.code(), error.to_string())
            }
            RealtimeError::Handler { message, fatal: false } => {
                OutboundMessage::error(error.code(), message.clone())
            }
            _ => OutboundMessage::error("internal_error", "Internal error"),
        };
        Some(event)
    }
}
