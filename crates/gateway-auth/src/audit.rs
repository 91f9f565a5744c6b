//! Audit sink that writes session lifecycle events to the tracing pipeline.

use async_trait::async_trait;
use tracing::info;

use gateway_core::events::{SessionEndReason, SessionEvent};
use gateway_core::result::AppResult;
use gateway_core::traits::audit::AuditSink;
use gateway_core::types::SessionRecord;

/// Logs each lifecycle event as JSON under the `audit` target. Used when no
/// relational store is wired and in tests.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    fn emit(&self, record: &SessionRecord, event: &SessionEvent) -> AppResult<()> {
        let event = serde_json::to_string(event)?;
        info!(
            target: "audit",
            session_id = %record.session_id,
            tenant_id = %record.scope.tenant_id,
            %event,
            "Session audit"
        );
        Ok(())
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record_issued(&self, record: &SessionRecord) -> AppResult<()> {
        self.emit(
            record,
            &SessionEvent::Created {
                session_id: record.session_id,
                principal_id: record.principal_id.clone(),
            },
        )
    }

    async fn record_refreshed(&self, record: &SessionRecord) -> AppResult<()> {
        self.emit(
            record,
            &SessionEvent::Refreshed {
                session_id: record.session_id,
            },
        )
    }

    async fn record_finished(
        &self,
        record: &SessionRecord,
        reason: SessionEndReason,
    ) -> AppResult<()> {
        self.emit(
            record,
            &SessionEvent::Ended {
                session_id: record.session_id,
                principal_id: record.principal_id.clone(),
                reason,
            },
        )
    }
}
