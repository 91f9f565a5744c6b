//! Realtime side of session termination.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{info, warn};

use gateway_core::events::SessionEndReason;
use gateway_core::traits::SessionObserver;
use gateway_core::types::SessionRecord;

use crate::hub::ConnectionHub;
use crate::message::OutboundMessage;

/// Disconnects the client of every session that ends.
///
/// The client is sent a `session_terminated` notice first and removed from
/// the hub after the grace period. A session with no client is a no-op.
#[derive(Debug, Clone)]
pub struct SessionTerminator {
    hub: Arc<ConnectionHub>,
    grace: Duration,
}

impl SessionTerminator {
    pub fn new(hub: Arc<ConnectionHub>) -> Self {
        let grace = hub.config().kill_grace();
        Self { hub, grace }
    }

    /// Override the grace period between notice and disconnect.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Notify, wait out the grace period, then remove the client.
    pub async fn terminate(&self, record: &SessionRecord, reason: SessionEndReason) {
        let session_id = record.session_id;
        let notice = OutboundMessage::session_terminated(session_id, reason, self.grace.as_secs());

        if self.hub.send_to_session(&session_id, notice).await {
            info!(
                %session_id,
                principal_id = %record.principal_id,
                %reason,
                grace_secs = self.grace.as_secs(),
                "Session terminated, disconnecting realtime client"
            );
            tokio::time::sleep(self.grace).await;
        }
        self.hub.delete(&session_id).await;
    }
}

impl SessionObserver for SessionTerminator {
    fn session_ended(&self, record: &SessionRecord, reason: SessionEndReason) {
        let Ok(runtime) = Handle::try_current() else {
            warn!(session_id = %record.session_id, "No runtime available to terminate realtime client");
            return;
        };
        let terminator = self.clone();
        let record = record.clone();
        runtime.spawn(async move { terminator.terminate(&record, reason).await });
    }
}
