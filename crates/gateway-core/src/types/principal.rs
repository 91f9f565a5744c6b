//! Authenticated principals and login grants.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::{PrincipalId, TenantId};

/// The login path a credential request came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Storefront or merchant user login.
    User,
    /// Back-office login; only admin-capable roles are accepted.
    Admin,
}

impl GrantType {
    /// Whether the grant honours the "remember me" flag.
    pub fn allows_remember(&self) -> bool {
        matches!(self, Self::User)
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// A principal resolved by the principal directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Principal identifier.
    pub id: PrincipalId,
    /// Tenant the principal acts for.
    pub tenant_id: TenantId,
    /// Role within the tenant.
    pub role: String,
    /// Login name.
    pub username: String,
}
