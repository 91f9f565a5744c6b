//! Principal repository implementation.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use gateway_core::error::{AppError, ErrorKind};
use gateway_core::result::AppResult;
use gateway_core::types::{Principal, PrincipalId, TenantId};

/// A row of the `principals` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PrincipalRecord {
    /// Principal identifier.
    pub id: String,
    /// Tenant the principal belongs to.
    pub tenant_id: String,
    /// Login name.
    pub username: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Role within the tenant.
    pub role: String,
    /// Disabled principals cannot log in.
    pub active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl PrincipalRecord {
    /// The public view of this row.
    pub fn to_principal(&self) -> Principal {
        Principal {
            id: PrincipalId::new(self.id.clone()),
            tenant_id: TenantId::new(self.tenant_id.clone()),
            role: self.role.clone(),
            username: self.username.clone(),
        }
    }
}

/// Repository for principal lookups.
#[derive(Debug, Clone)]
pub struct PrincipalRepository {
    pool: PgPool,
}

impl PrincipalRepository {
    /// Create a new principal repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a principal by username (case-insensitive).
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<PrincipalRecord>> {
        sqlx::query_as::<_, PrincipalRecord>(
            "SELECT * FROM principals WHERE LOWER(username) = LOWER($1)",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find principal by username", e)
        })
    }
}
