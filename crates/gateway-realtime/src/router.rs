//! Inbound message routing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use gateway_core::types::{AuthScope, PrincipalId, SessionId};

use crate::error::RealtimeError;
use crate::message::{InboundEnvelope, OutboundMessage};

/// Identity of the connection a message arrived on.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub session_id: SessionId,
    pub principal_id: PrincipalId,
    pub scope: AuthScope,
}

/// Failure reported by a handler.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    /// Reported to the client; the connection stays open.
    #[error("{0}")]
    Recoverable(String),
    /// The connection is closed.
    #[error("{0}")]
    Fatal(String),
}

/// Handles one inbound message type.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle a payload, optionally replying to the sender.
    async fn handle(
        &self,
        ctx: &HandlerContext,
        payload: Value,
    ) -> Result<Option<OutboundMessage>, HandlerError>;
}

/// Replies to `ping` with a `pong` echoing the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct PingHandler;

#[async_trait]
impl MessageHandler for PingHandler {
    async fn handle(
        &self,
        _ctx: &HandlerContext,
        payload: Value,
    ) -> Result<Option<OutboundMessage>, HandlerError> {
        Ok(Some(OutboundMessage::pong(payload)))
    }
}

/// Dispatch table from envelope type to handler.
#[derive(Clone)]
pub struct Router {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.handlers.keys().collect();
        types.sort();
        f.debug_struct("Router").field("types", &types).finish()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// A router with the built-in `ping` handler.
    pub fn new() -> Self {
        Self::empty().route("ping", PingHandler)
    }

    /// A router with no handlers.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `kind`, replacing any previous handler.
    pub fn route(mut self, kind: impl Into<String>, handler: impl MessageHandler) -> Self {
        self.handlers.insert(kind.into(), Arc::new(handler));
        self
    }

    /// Route an envelope to its handler.
    pub async fn dispatch(
        &self,
        ctx: &HandlerContext,
        envelope: InboundEnvelope,
    ) -> Result<Option<OutboundMessage>, RealtimeError> {
        let handler = self
            .handlers
            .get(&envelope.kind)
            .ok_or_else(|| RealtimeError::UnknownMessageType(envelope.kind.clone()))?;

        handler
            .handle(ctx, envelope.payload)
            .await
            .map_err(|e| match e {
                HandlerError::Recoverable(message) => RealtimeError::Handler {
                    message,
                    fatal: false,
                },
                HandlerError::Fatal(message) => RealtimeError::Handler {
                    message,
                    fatal: true,
                },
            })
    }
}
