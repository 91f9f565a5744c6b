//! The connection hub: at most one live client per session.
//!
//! The hub owns admission (credential check, duplicate rejection, keyword
//! computation), keyword-filtered broadcast and forced removal. Its lock is
//! never held across transport I/O; broadcasts publish to a snapshot.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use futures::{Sink, SinkExt, Stream};
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time;
use tracing::{debug, info, warn};

use gateway_auth::SessionValidator;
use gateway_core::config::realtime::RealtimeConfig;
use gateway_core::error::ErrorKind;
use gateway_core::traits::PolicyEngine;
use gateway_core::types::{SessionId, SessionRecord};

use crate::client::{self, Client, ClientState, CloseReason, Services};
use crate::error::RealtimeError;
use crate::error_handler::{DefaultErrorHandler, ErrorHandler};
use crate::heartbeat::HeartbeatSettings;
use crate::keywords::KeywordSet;
use crate::message::{Frame, OutboundMessage};
use crate::router::{HandlerContext, Router};

/// Query parameters of a realtime upgrade request.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectRequest {
    /// Session the connection claims.
    pub session_id: String,
    /// Access credential of that session.
    pub token: String,
}

#[derive(Debug, Default)]
struct HubInner {
    by_session: HashMap<SessionId, Arc<Client>>,
    /// Insertion order of `by_session`.
    order: Vec<SessionId>,
}

impl HubInner {
    fn remove(&mut self, session_id: &SessionId) -> Option<Arc<Client>> {
        let client = self.by_session.remove(session_id)?;
        self.order.retain(|id| id != session_id);
        Some(client)
    }
}

/// Process-wide registry of live realtime clients.
pub struct ConnectionHub {
    inner: RwLock<HubInner>,
    validator: SessionValidator,
    policy: Arc<dyn PolicyEngine>,
    router: Arc<Router>,
    errors: Arc<dyn ErrorHandler>,
    config: RealtimeConfig,
}

impl std::fmt::Debug for ConnectionHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHub")
            .field("router", &self.router)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConnectionHub {
    /// Create a hub with the default router and error handler.
    pub fn new(
        validator: SessionValidator,
        policy: Arc<dyn PolicyEngine>,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            inner: RwLock::new(HubInner::default()),
            validator,
            policy,
            router: Arc::new(Router::new()),
            errors: Arc::new(DefaultErrorHandler),
            config,
        }
    }

    /// Replace the inbound router.
    pub fn with_router(mut self, router: Router) -> Self {
        self.router = Arc::new(router);
        self
    }

    /// Replace the error handler.
    pub fn with_error_handler(mut self, errors: impl ErrorHandler) -> Self {
        self.errors = Arc::new(errors);
        self
    }

    /// Realtime settings the hub was built with.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Authenticate a connect request and attach the transport as a client.
    ///
    /// On any failure the transport is closed and no client is registered.
    pub async fn admit<S, R, SE, RE>(
        self: &Arc<Self>,
        request: ConnectRequest,
        sink: S,
        stream: R,
    ) -> Result<Arc<Client>, RealtimeError>
    where
        S: Sink<Frame, Error = SE> + Send + 'static,
        SE: Display + Send + 'static,
        R: Stream<Item = Result<Frame, RE>> + Send + 'static,
        RE: Display + Send + 'static,
    {
        let mut sink = Box::pin(sink);

        let (record, keywords) = match self.authorize(&request).await {
            Ok(admitted) => admitted,
            Err(e) => {
                warn!(session_id = %request.session_id, error = %e, "Realtime connection refused");
                reject(&mut sink).await;
                return Err(e);
            }
        };

        let session_id = record.session_id;
        let context = HandlerContext {
            session_id,
            principal_id: record.principal_id.clone(),
            scope: record.scope.clone(),
        };
        let (client, parts) = Client::new(context, keywords, &self.config);

        if let Err(e) = self.store(Arc::clone(&client)).await {
            warn!(%session_id, error = %e, "Realtime connection refused");
            client.close(CloseReason::Rejected);
            client.mark_closed();
            reject(&mut sink).await;
            return Err(e);
        }

        let registry = self.validator.registry();
        if !registry.set_connected(&session_id, true).await {
            // The session ended between validation and storing.
            self.remove_client(&client).await;
            client.close(CloseReason::Rejected);
            client.mark_closed();
            reject(&mut sink).await;
            return Err(RealtimeError::Unauthenticated(
                "session ended while connecting".to_string(),
            ));
        }

        let services = Services {
            router: Arc::clone(&self.router),
            errors: Arc::clone(&self.errors),
            registry: Arc::clone(registry),
            heartbeat: HeartbeatSettings::from_config(&self.config),
        };
        let hub = Arc::clone(self);
        let served = Arc::clone(&client);
        tokio::spawn(async move {
            client::serve(Arc::clone(&served), parts, sink, Box::pin(stream), services).await;
            hub.finish(&served).await;
        });

        info!(
            %session_id,
            principal_id = %record.principal_id,
            keywords = client.keywords().len(),
            "Realtime connection established"
        );
        Ok(client)
    }

    async fn authorize(
        &self,
        request: &ConnectRequest,
    ) -> Result<(SessionRecord, KeywordSet), RealtimeError> {
        let session_id: SessionId = request
            .session_id
            .parse()
            .map_err(|_| RealtimeError::Unauthenticated("invalid session id".to_string()))?;

        let record = self
            .validator
            .validate(&request.token)
            .await
            .map_err(|e| match e.kind {
                ErrorKind::Authentication | ErrorKind::Validation => {
                    RealtimeError::Unauthenticated(e.message)
                }
                _ => RealtimeError::Internal(e),
            })?;

        if record.session_id != session_id {
            return Err(RealtimeError::Unauthenticated(
                "credential does not belong to this session".to_string(),
            ));
        }
        if self.contains(&session_id).await {
            return Err(RealtimeError::DuplicateConnection(session_id));
        }

        let keywords = KeywordSet::for_session(self.policy.as_ref(), &record).await?;
        Ok((record, keywords))
    }

    /// Register a client. Fails if its session already has one.
    pub async fn store(&self, client: Arc<Client>) -> Result<(), RealtimeError> {
        let session_id = client.session_id();
        let mut inner = self.inner.write().await;
        if inner.by_session.contains_key(&session_id) {
            return Err(RealtimeError::DuplicateConnection(session_id));
        }
        inner.by_session.insert(session_id, client);
        inner.order.push(session_id);
        Ok(())
    }

    /// Remove and close the client for a session. Idempotent.
    pub async fn delete(&self, session_id: &SessionId) -> Option<Arc<Client>> {
        let client = self.inner.write().await.remove(session_id)?;
        client.close(CloseReason::Evicted);
        debug!(%session_id, "Realtime client removed from hub");
        Some(client)
    }

    /// Remove and close every client. Returns how many were removed.
    pub async fn delete_all(&self) -> usize {
        let clients: Vec<Arc<Client>> = {
            let mut inner = self.inner.write().await;
            inner.order.clear();
            inner.by_session.drain().map(|(_, client)| client).collect()
        };
        for client in &clients {
            client.close(CloseReason::Shutdown);
        }
        if !clients.is_empty() {
            info!(count = clients.len(), "Closed all realtime connections");
        }
        clients.len()
    }

    /// Publish to every client whose keywords intersect `tags`.
    ///
    /// Returns the number of clients that accepted the message.
    pub async fn broadcast(&self, tags: &[&str], message: OutboundMessage) -> usize {
        let recipients: Vec<Arc<Client>> = {
            let inner = self.inner.read().await;
            inner
                .order
                .iter()
                .filter_map(|id| inner.by_session.get(id))
                .filter(|client| client.keywords().intersects(tags))
                .cloned()
                .collect()
        };

        let mut delivered = 0;
        for client in recipients {
            let mut addressed = message.clone();
            addressed.session_id = Some(client.session_id());
            if client.publish(addressed) {
                delivered += 1;
            }
        }
        debug!(?tags, message_type = %message.kind, delivered, "Broadcast published");
        delivered
    }

    /// Publish to the client of one session. `false` if absent or dropped.
    pub async fn send_to_session(&self, session_id: &SessionId, message: OutboundMessage) -> bool {
        match self.get(session_id).await {
            Some(client) => client.publish(message),
            None => false,
        }
    }

    /// The client attached to a session, if any.
    pub async fn get(&self, session_id: &SessionId) -> Option<Arc<Client>> {
        self.inner.read().await.by_session.get(session_id).cloned()
    }

    /// Whether a session has a client.
    pub async fn contains(&self, session_id: &SessionId) -> bool {
        self.inner.read().await.by_session.contains_key(session_id)
    }

    /// Sessions with a client, in connection order.
    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.inner.read().await.order.clone()
    }

    /// Number of connected clients.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_session.len()
    }

    /// True when no client is connected.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.by_session.is_empty()
    }

    /// Remove `client` only if it is still the one registered for its session.
    async fn remove_client(&self, client: &Arc<Client>) -> bool {
        let session_id = client.session_id();
        let mut inner = self.inner.write().await;
        let current = inner
            .by_session
            .get(&session_id)
            .is_some_and(|c| Arc::ptr_eq(c, client));
        if current {
            inner.remove(&session_id);
        }
        current
    }

    /// Final teardown once a client's tasks have all stopped.
    async fn finish(&self, client: &Arc<Client>) {
        let session_id = client.session_id();
        self.remove_client(client).await;

        if !self.contains(&session_id).await {
            self.validator
                .registry()
                .set_connected(&session_id, false)
                .await;
        }

        debug_assert!(client.state() >= ClientState::Closing);
        client.mark_closed();
        info!(%session_id, "Realtime connection closed");
    }
}

/// Best-effort close of a transport that never became a client.
async fn reject<S, E>(sink: &mut S)
where
    S: Sink<Frame, Error = E> + Unpin,
{
    let _ = time::timeout(std::time::Duration::from_secs(1), async {
        let _ = sink.send(Frame::Close).await;
        let _ = sink.close().await;
    })
    .await;
}
