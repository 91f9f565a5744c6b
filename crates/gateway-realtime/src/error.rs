//! Realtime-specific error types.

use gateway_core::error::AppError;
use gateway_core::types::SessionId;

/// Errors raised while admitting or serving a realtime connection.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    /// The session already has a live connection in the hub.
    #[error("session {0} already has a live connection")]
    DuplicateConnection(SessionId),

    /// An inbound frame could not be decoded as an envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// No handler is registered for the envelope's type.
    #[error("unknown message type '{0}'")]
    UnknownMessageType(String),

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A message handler failed.
    #[error("handler error: {message}")]
    Handler {
        /// Handler-supplied description.
        message: String,
        /// Whether the connection must be closed.
        fatal: bool,
    },

    /// The connect request did not carry a valid session credential.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// A collaborator (store, registry, policy) failed.
    #[error(transparent)]
    Internal(#[from] AppError),
}

impl RealtimeError {
    /// Stable code sent to clients in `error` events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateConnection(_) => "duplicate_connection",
            Self::MalformedEnvelope(_) => "malformed_envelope",
            Self::UnknownMessageType(_) => "unknown_message_type",
            Self::Transport(_) => "transport_error",
            Self::Handler { .. } => "handler_error",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether the connection must be closed after this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::MalformedEnvelope(_) | Self::UnknownMessageType(_) => false,
            Self::Handler { fatal, .. } => *fatal,
            _ => true,
        }
    }
}

impl From<RealtimeError> for AppError {
    fn from(err: RealtimeError) -> Self {
        match err {
            RealtimeError::DuplicateConnection(_) => AppError::conflict(err.to_string()),
            RealtimeError::MalformedEnvelope(_) | RealtimeError::UnknownMessageType(_) => {
                AppError::validation(err.to_string())
            }
            RealtimeError::Unauthenticated(_) => AppError::authentication(err.to_string()),
            RealtimeError::Transport(_) | RealtimeError::Handler { .. } => {
                AppError::internal(err.to_string())
            }
            RealtimeError::Internal(inner) => inner,
        }
    }
}
