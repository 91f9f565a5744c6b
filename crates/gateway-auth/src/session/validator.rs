//! Per-request credential validation.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use gateway_core::result::AppResult;
use gateway_core::types::SessionRecord;

use super::registry::ActiveSessionRegistry;
use super::store::SessionStore;

/// Resolves access credentials and records activity in the registry.
///
/// Shared by the session manager and the realtime hub; it depends only on
/// the store and the registry so both can be built before the manager.
#[derive(Debug, Clone)]
pub struct SessionValidator {
    store: Arc<SessionStore>,
    registry: Arc<ActiveSessionRegistry>,
}

impl SessionValidator {
    /// Create a validator over the shared store and registry.
    pub fn new(store: Arc<SessionStore>, registry: Arc<ActiveSessionRegistry>) -> Self {
        Self { store, registry }
    }

    /// Validate an access credential and touch its session.
    ///
    /// A durable session missing from the registry (a remember session whose
    /// idle entry was released, or a session from before a restart) is
    /// registered again.
    pub async fn validate(&self, access: &str) -> AppResult<SessionRecord> {
        let record = self.store.validate(access).await?;
        let now = Utc::now();

        if self.registry.touch(&record.session_id, now).await {
            return Ok(self
                .registry
                .get_by_id(&record.session_id)
                .await
                .unwrap_or(record));
        }

        debug!(session_id = %record.session_id, "Re-registering durable session");
        let mut readmitted = record;
        readmitted.last_activity = now;
        readmitted.connected = false;
        self.registry.insert(readmitted.clone()).await;
        Ok(readmitted)
    }

    /// The shared registry.
    pub fn registry(&self) -> &Arc<ActiveSessionRegistry> {
        &self.registry
    }
}
