//! Session lifecycle observers.

use crate::events::SessionEndReason;
use crate::types::SessionRecord;

/// Notified after a session has been removed from the durable store.
///
/// Observers are registered when the session manager is constructed and
/// must not block; long-running work belongs in a spawned task.
pub trait SessionObserver: Send + Sync + 'static {
    /// A session ended.
    fn session_ended(&self, record: &SessionRecord, reason: SessionEndReason);
}
