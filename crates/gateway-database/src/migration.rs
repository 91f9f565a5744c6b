//! Schema bootstrap.
//!
//! The gateway owns two tables; both are created idempotently at startup.

use sqlx::PgPool;
use tracing::info;

use gateway_core::error::{AppError, ErrorKind};

const SCHEMA: &[(&str, &str)] = &[
    (
        "principals",
        r#"CREATE TABLE IF NOT EXISTS principals (
            id            TEXT PRIMARY KEY,
            tenant_id     TEXT NOT NULL,
            username      TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role          TEXT NOT NULL,
            active        BOOLEAN NOT NULL DEFAULT TRUE,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    ),
    (
        "session_audit",
        r#"CREATE TABLE IF NOT EXISTS session_audit (
            session_id        UUID PRIMARY KEY,
            principal_id      TEXT NOT NULL,
            tenant_id         TEXT NOT NULL,
            role              TEXT NOT NULL,
            ip_address        TEXT,
            user_agent        TEXT,
            remember          BOOLEAN NOT NULL DEFAULT FALSE,
            started_at        TIMESTAMPTZ NOT NULL,
            last_refreshed_at TIMESTAMPTZ,
            refresh_count     INTEGER NOT NULL DEFAULT 0,
            ended_at          TIMESTAMPTZ,
            end_reason        TEXT
        )"#,
    ),
    (
        "session_audit_principal_idx",
        "CREATE INDEX IF NOT EXISTS session_audit_principal_idx \
         ON session_audit (principal_id, started_at DESC)",
    ),
];

/// Create any missing gateway tables.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    info!("Running database migrations...");

    for (name, statement) in SCHEMA {
        sqlx::query(statement).execute(pool).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to apply schema step '{name}': {e}"),
                e,
            )
        })?;
    }

    info!(steps = SCHEMA.len(), "Database migrations completed successfully");
    Ok(())
}
