//! In-memory registry of live sessions.
//!
//! The registry is an eventually-consistent view of the durable store. It is
//! constructed once at startup and shared by `Arc`; it is rebuildable from
//! the durable store after a restart.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use gateway_core::types::{PrincipalId, SessionId, SessionRecord};

/// Live sessions keyed by session id.
#[derive(Debug, Default)]
pub struct ActiveSessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
}

impl ActiveSessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a session. Returns the previous entry.
    pub async fn insert(&self, record: SessionRecord) -> Option<SessionRecord> {
        self.sessions
            .write()
            .await
            .insert(record.session_id, record)
    }

    /// Remove a session.
    pub async fn remove(&self, session_id: &SessionId) -> Option<SessionRecord> {
        self.sessions.write().await.remove(session_id)
    }

    /// Record activity on a session. Returns `false` if it is not registered.
    pub async fn touch(&self, session_id: &SessionId, at: DateTime<Utc>) -> bool {
        match self.sessions.write().await.get_mut(session_id) {
            Some(record) => {
                if at > record.last_activity {
                    record.last_activity = at;
                }
                true
            }
            None => false,
        }
    }

    /// Flag whether a realtime connection is attached.
    pub async fn set_connected(&self, session_id: &SessionId, connected: bool) -> bool {
        match self.sessions.write().await.get_mut(session_id) {
            Some(record) => {
                record.connected = connected;
                true
            }
            None => false,
        }
    }

    /// Number of registered sessions owned by a principal.
    pub async fn count_by_principal(&self, principal_id: &PrincipalId) -> u32 {
        let count = self
            .sessions
            .read()
            .await
            .values()
            .filter(|r| &r.principal_id == principal_id)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// The principal's session with the earliest start time.
    ///
    /// Ties are broken by session id so the choice is deterministic.
    pub async fn oldest_by_principal(&self, principal_id: &PrincipalId) -> Option<SessionRecord> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|r| &r.principal_id == principal_id)
            .min_by_key(|r| (r.started_at, r.session_id))
            .cloned()
    }

    /// Snapshot of every registered session.
    pub async fn get_all(&self) -> Vec<SessionRecord> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// A single session.
    pub async fn get_by_id(&self, session_id: &SessionId) -> Option<SessionRecord> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Sessions with no attached connection whose last activity is at or
    /// before `cutoff`.
    pub async fn idle_candidates(&self, cutoff: DateTime<Utc>) -> Vec<SessionRecord> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|r| !r.connected && r.last_activity <= cutoff)
            .cloned()
            .collect()
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
