//! Session audit trail.

use async_trait::async_trait;

use crate::events::SessionEndReason;
use crate::result::AppResult;
use crate::types::SessionRecord;

/// Receives session lifecycle audit entries.
///
/// Audit writes are best effort: callers log failures and carry on.
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    /// A session was created.
    async fn record_issued(&self, record: &SessionRecord) -> AppResult<()>;

    /// A session's credentials were refreshed.
    async fn record_refreshed(&self, record: &SessionRecord) -> AppResult<()>;

    /// A session ended.
    async fn record_finished(
        &self,
        record: &SessionRecord,
        reason: SessionEndReason,
    ) -> AppResult<()>;
}
