//! Session records and issued credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{PrincipalId, SessionId, TenantId};

/// Authorization scope bound to a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthScope {
    /// Tenant the session acts for.
    pub tenant_id: TenantId,
    /// Role within the tenant.
    pub role: String,
}

/// Request metadata captured when a session is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Keep the session beyond the normal refresh lifetime.
    pub remember: bool,
}

/// The durable record of one authenticated login.
///
/// The raw credentials are never part of the record; only their SHA-256
/// digests are kept so a revoke can find the credential keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier.
    pub session_id: SessionId,
    /// Owning principal.
    pub principal_id: PrincipalId,
    /// Authorization scope.
    pub scope: AuthScope,
    /// When the session was created.
    pub started_at: DateTime<Utc>,
    /// Last validated request or realtime frame.
    pub last_activity: DateTime<Utc>,
    /// When the durable session record expires.
    pub expires_at: DateTime<Utc>,
    /// Origin IP address.
    pub ip_address: Option<String>,
    /// Origin user agent.
    pub user_agent: Option<String>,
    /// "Remember me" session.
    pub remember: bool,
    /// A realtime connection is currently attached.
    #[serde(default)]
    pub connected: bool,
    /// Digest of the current access credential.
    pub access_digest: String,
    /// Digest of the current refresh credential.
    pub refresh_digest: String,
}

impl SessionRecord {
    /// Seconds since the last recorded activity.
    pub fn idle_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_activity).num_seconds().max(0)
    }

    /// Whether the durable lifetime has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A freshly minted credential pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCredentials {
    /// Session the credentials resolve to.
    pub session_id: SessionId,
    /// Short-lived bearer credential.
    pub access: String,
    /// Longer-lived credential used only to mint new access credentials.
    pub refresh: String,
    /// When the access credential expires.
    pub expires_at: DateTime<Utc>,
    /// When the refresh credential (and session) expires.
    pub refresh_expires_at: DateTime<Utc>,
}
