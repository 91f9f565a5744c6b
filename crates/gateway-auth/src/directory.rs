//! Principal directory backed by the `principals` table.

use async_trait::async_trait;
use tracing::{debug, warn};

use gateway_core::error::AppError;
use gateway_core::result::AppResult;
use gateway_core::traits::directory::PrincipalDirectory;
use gateway_core::types::{GrantType, Principal};
use gateway_database::repositories::PrincipalRepository;

use crate::password::PasswordHasher;

const INVALID_LOGIN: &str = "Invalid username or password";

/// Verifies secrets against Argon2 hashes stored in PostgreSQL.
#[derive(Debug, Clone)]
pub struct DatabasePrincipalDirectory {
    repo: PrincipalRepository,
    hasher: PasswordHasher,
}

impl DatabasePrincipalDirectory {
    /// Create a directory over the given repository.
    pub fn new(repo: PrincipalRepository) -> Self {
        Self {
            repo,
            hasher: PasswordHasher::new(),
        }
    }
}

#[async_trait]
impl PrincipalDirectory for DatabasePrincipalDirectory {
    async fn authenticate(
        &self,
        grant: GrantType,
        username: &str,
        secret: &str,
    ) -> AppResult<Principal> {
        let Some(row) = self.repo.find_by_username(username).await? else {
            debug!(%grant, "Login for unknown username");
            return Err(AppError::authentication(INVALID_LOGIN));
        };

        if !row.active {
            warn!(principal_id = %row.id, %grant, "Login attempt on disabled principal");
            return Err(AppError::authentication(INVALID_LOGIN));
        }

        if !self.hasher.verify_password(secret, &row.password_hash)? {
            debug!(principal_id = %row.id, %grant, "Wrong secret");
            return Err(AppError::authentication(INVALID_LOGIN));
        }

        Ok(row.to_principal())
    }
}
