//! Session audit trail stored in `session_audit`.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use gateway_core::error::{AppError, ErrorKind};
use gateway_core::events::SessionEndReason;
use gateway_core::result::AppResult;
use gateway_core::traits::audit::AuditSink;
use gateway_core::types::SessionRecord;

/// One row per session: inserted at issue, updated on refresh and on end.
#[derive(Debug, Clone)]
pub struct SessionAuditRepository {
    pool: PgPool,
}

impl SessionAuditRepository {
    /// Create a new session audit repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for SessionAuditRepository {
    async fn record_issued(&self, record: &SessionRecord) -> AppResult<()> {
        sqlx::query(
            r#"INSERT INTO session_audit
                (session_id, principal_id, tenant_id, role, ip_address, user_agent, remember, started_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               ON CONFLICT (session_id) DO NOTHING"#,
        )
        .bind(record.session_id.into_uuid())
        .bind(record.principal_id.as_str())
        .bind(record.scope.tenant_id.as_str())
        .bind(&record.scope.role)
        .bind(record.ip_address.as_deref())
        .bind(record.user_agent.as_deref())
        .bind(record.remember)
        .bind(record.started_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to audit session issue", e))?;
        Ok(())
    }

    async fn record_refreshed(&self, record: &SessionRecord) -> AppResult<()> {
        sqlx::query(
            r#"UPDATE session_audit
               SET last_refreshed_at = $2, refresh_count = refresh_count + 1
               WHERE session_id = $1"#,
        )
        .bind(record.session_id.into_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to audit session refresh", e)
        })?;
        Ok(())
    }

    async fn record_finished(
        &self,
        record: &SessionRecord,
        reason: SessionEndReason,
    ) -> AppResult<()> {
        sqlx::query(
            r#"UPDATE session_audit
               SET ended_at = $2, end_reason = $3
               WHERE session_id = $1 AND ended_at IS NULL"#,
        )
        .bind(record.session_id.into_uuid())
        .bind(Utc::now())
        .bind(reason.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to audit session end", e))?;
        Ok(())
    }
}
