//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gateway_core::types::{IssuedCredentials, Principal, SessionId, SessionRecord};

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// A freshly issued credential pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub session_id: SessionId,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl From<IssuedCredentials> for TokenResponse {
    fn from(credentials: IssuedCredentials) -> Self {
        Self {
            session_id: credentials.session_id,
            access_token: credentials.access,
            refresh_token: credentials.refresh,
            access_expires_at: credentials.expires_at,
            refresh_expires_at: credentials.refresh_expires_at,
        }
    }
}

/// Principal summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalResponse {
    pub id: String,
    pub tenant_id: String,
    pub role: String,
    pub username: String,
}

impl From<Principal> for PrincipalResponse {
    fn from(principal: Principal) -> Self {
        Self {
            id: principal.id.to_string(),
            tenant_id: principal.tenant_id.to_string(),
            role: principal.role,
            username: principal.username,
        }
    }
}

/// Login response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Issued credentials.
    #[serde(flatten)]
    pub tokens: TokenResponse,
    /// Whether the session survives idle sweeps.
    pub remember: bool,
    /// Authenticated principal.
    pub principal: PrincipalResponse,
    /// Sessions ended to stay within the concurrency limit.
    pub evicted_sessions: Vec<SessionId>,
}

/// The caller's current session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: SessionId,
    pub principal_id: String,
    pub tenant_id: String,
    pub role: String,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub remember: bool,
    pub connected: bool,
}

impl From<SessionRecord> for SessionResponse {
    fn from(record: SessionRecord) -> Self {
        Self {
            session_id: record.session_id,
            principal_id: record.principal_id.to_string(),
            tenant_id: record.scope.tenant_id.to_string(),
            role: record.scope.role,
            started_at: record.started_at,
            last_activity: record.last_activity,
            expires_at: record.expires_at,
            remember: record.remember,
            connected: record.connected,
        }
    }
}

/// Simple message response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Message.
    pub message: String,
}

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Dependency health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub database: String,
    pub cache: String,
    pub active_sessions: usize,
    pub realtime_connections: usize,
}
