//! Credential lifetime configuration.

use serde::{Deserialize, Serialize};

/// Authentication and credential configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Access credential TTL in seconds.
    #[serde(default = "default_access_ttl")]
    pub access_ttl_seconds: u64,
    /// Refresh credential TTL in seconds; also the lifetime of a normal session.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_seconds: u64,
    /// Session lifetime in seconds when the principal asked to be remembered.
    #[serde(default = "default_remember_ttl")]
    pub remember_ttl_seconds: u64,
    /// Whether a refresh also replaces the refresh credential.
    #[serde(default = "default_true")]
    pub rotate_refresh: bool,
    /// Roles permitted to log in with the admin grant.
    #[serde(default = "default_admin_roles")]
    pub admin_roles: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_ttl_seconds: default_access_ttl(),
            refresh_ttl_seconds: default_refresh_ttl(),
            remember_ttl_seconds: default_remember_ttl(),
            rotate_refresh: default_true(),
            admin_roles: default_admin_roles(),
        }
    }
}

impl AuthConfig {
    /// Lifetime of a session record, honouring the remember flag.
    pub fn session_ttl_seconds(&self, remember: bool) -> u64 {
        if remember {
            self.remember_ttl_seconds.max(self.refresh_ttl_seconds)
        } else {
            self.refresh_ttl_seconds
        }
    }

    /// Whether a role may use the admin grant.
    pub fn is_admin_role(&self, role: &str) -> bool {
        self.admin_roles.iter().any(|r| r == role)
    }
}

fn default_access_ttl() -> u64 {
    15 * 60
}

fn default_refresh_ttl() -> u64 {
    24 * 60 * 60
}

fn default_remember_ttl() -> u64 {
    30 * 24 * 60 * 60
}

fn default_true() -> bool {
    true
}

fn default_admin_roles() -> Vec<String> {
    vec!["admin".to_string()]
}
