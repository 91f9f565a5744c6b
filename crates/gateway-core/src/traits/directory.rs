//! Principal lookup and secret verification.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::{GrantType, Principal};

/// Resolves login credentials to a principal.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync + 'static {
    /// Verify `secret` for `username` under the given grant.
    ///
    /// Unknown users and wrong secrets both return an authentication error.
    async fn authenticate(
        &self,
        grant: GrantType,
        username: &str,
        secret: &str,
    ) -> AppResult<Principal>;
}
