//! Durable session store: credential issuance, validation, refresh and revoke.
//!
//! Layout (relative keys, the cache provider applies the prefix):
//!
//! | key                                       | value           | ttl              |
//! |-------------------------------------------|-----------------|------------------|
//! | `session:{session_id}`                    | `SessionRecord` | session lifetime |
//! | `access:{sha256(access)}`                 | `SessionRecord` | access ttl       |
//! | `refresh:{sha256(refresh)}`               | session id      | session lifetime |
//! | `principal:{sha256(principal)}:{session}` | session id      | session lifetime |
//!
//! `session:{id}` is authoritative: an access entry only resolves while the
//! session record still names its digest.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use gateway_cache::keys;
use gateway_core::config::auth::AuthConfig;
use gateway_core::error::{AppError, ErrorKind};
use gateway_core::events::SessionEndReason;
use gateway_core::result::AppResult;
use gateway_core::traits::{AuditSink, CacheProvider};
use gateway_core::types::{
    AuthScope, IssuedCredentials, PrincipalId, SessionId, SessionMetadata, SessionRecord,
};

use crate::credential;

const UNKNOWN_CREDENTIAL: &str = "Credential not found or expired";

/// Issues and resolves credentials against the durable cache.
#[derive(Clone)]
pub struct SessionStore {
    cache: Arc<dyn CacheProvider>,
    audit: Arc<dyn AuditSink>,
    config: AuthConfig,
    /// Per-session write locks; refresh and revoke of one session never
    /// interleave their read-modify-write.
    writers: Arc<DashMap<SessionId, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Creates a new session store.
    pub fn new(cache: Arc<dyn CacheProvider>, audit: Arc<dyn AuditSink>, config: AuthConfig) -> Self {
        Self {
            cache,
            audit,
            config,
            writers: Arc::new(DashMap::new()),
        }
    }

    /// Credential configuration in effect.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Create a session and mint its first credential pair.
    ///
    /// The durable keys are written in one atomic multi-key write; if that
    /// fails nothing is observable and the error propagates.
    pub async fn issue(
        &self,
        principal_id: &PrincipalId,
        scope: AuthScope,
        metadata: SessionMetadata,
    ) -> AppResult<(IssuedCredentials, SessionRecord)> {
        let now = Utc::now();
        let session_ttl = Duration::from_secs(self.config.session_ttl_seconds(metadata.remember));
        let access_ttl = self.access_ttl(session_ttl);

        let access = credential::generate()?;
        let refresh = credential::generate()?;

        let record = SessionRecord {
            session_id: SessionId::new(),
            principal_id: principal_id.clone(),
            scope,
            started_at: now,
            last_activity: now,
            expires_at: after(now, session_ttl),
            ip_address: metadata.ip_address,
            user_agent: metadata.user_agent,
            remember: metadata.remember,
            connected: false,
            access_digest: credential::digest(&access),
            refresh_digest: credential::digest(&refresh),
        };

        let json = serde_json::to_string(&record)?;
        let entries = vec![
            (keys::session(record.session_id), json.clone(), session_ttl),
            (keys::access(&record.access_digest), json, access_ttl),
            (
                keys::refresh(&record.refresh_digest),
                record.session_id.to_string(),
                session_ttl,
            ),
            (
                principal_index(&record),
                record.session_id.to_string(),
                session_ttl,
            ),
        ];
        self.cache.set_many(&entries).await?;

        if let Err(e) = self.audit.record_issued(&record).await {
            warn!(session_id = %record.session_id, error = %e, "Failed to audit session issue");
        }

        info!(
            session_id = %record.session_id,
            principal_id = %record.principal_id,
            remember = record.remember,
            "Session issued"
        );

        let credentials = IssuedCredentials {
            session_id: record.session_id,
            access,
            refresh,
            expires_at: after(now, access_ttl),
            refresh_expires_at: record.expires_at,
        };
        Ok((credentials, record))
    }

    /// Resolve an access credential to its session.
    ///
    /// The credential must still be the one the session record names; an
    /// access entry left behind by a refresh or revoke does not resolve.
    pub async fn validate(&self, access: &str) -> AppResult<SessionRecord> {
        credential::check_format(access)?;

        let digest = credential::digest(access);
        let Some(json) = self.cache.get(&keys::access(&digest)).await? else {
            return Err(AppError::authentication(UNKNOWN_CREDENTIAL));
        };
        let indexed: SessionRecord = serde_json::from_str(&json)?;

        let Some(record) = self.get(indexed.session_id).await? else {
            return Err(AppError::authentication(UNKNOWN_CREDENTIAL));
        };
        if record.access_digest != digest || record.is_expired(Utc::now()) {
            return Err(AppError::authentication(UNKNOWN_CREDENTIAL));
        }
        Ok(record)
    }

    /// Mint a new access credential from a refresh credential.
    ///
    /// The prior access credential stops resolving. With `rotate` the refresh
    /// credential is replaced too. The session lifetime is not extended.
    pub async fn refresh(
        &self,
        refresh: &str,
        rotate: bool,
    ) -> AppResult<(IssuedCredentials, SessionRecord)> {
        credential::check_format(refresh)?;

        let refresh_digest = credential::digest(refresh);
        let Some(session_id) = self.cache.get(&keys::refresh(&refresh_digest)).await? else {
            return Err(AppError::authentication(UNKNOWN_CREDENTIAL));
        };
        let session_id: SessionId = session_id
            .parse()
            .map_err(|_| AppError::authentication(UNKNOWN_CREDENTIAL))?;

        let (credentials, record) = self
            .serialized(session_id, self.replace_access(session_id, refresh, rotate))
            .await?;

        if let Err(e) = self.audit.record_refreshed(&record).await {
            warn!(session_id = %record.session_id, error = %e, "Failed to audit session refresh");
        }

        debug!(session_id = %record.session_id, rotated = rotate, "Session refreshed");
        Ok((credentials, record))
    }

    async fn replace_access(
        &self,
        session_id: SessionId,
        refresh: &str,
        rotate: bool,
    ) -> AppResult<(IssuedCredentials, SessionRecord)> {
        let Some(mut record) = self.get(session_id).await? else {
            return Err(AppError::authentication(UNKNOWN_CREDENTIAL));
        };

        // The record names the current refresh credential.
        let refresh_digest = credential::digest(refresh);
        if record.refresh_digest != refresh_digest {
            return Err(AppError::authentication(UNKNOWN_CREDENTIAL));
        }

        let now = Utc::now();
        let session_ttl = (record.expires_at - now)
            .to_std()
            .ok()
            .filter(|ttl| !ttl.is_zero())
            .ok_or_else(|| AppError::authentication(UNKNOWN_CREDENTIAL))?;
        let access_ttl = self.access_ttl(session_ttl);

        let mut stale = vec![keys::access(&record.access_digest)];
        let access = credential::generate()?;
        record.access_digest = credential::digest(&access);
        record.last_activity = now;

        let new_refresh = if rotate {
            let fresh = credential::generate()?;
            record.refresh_digest = credential::digest(&fresh);
            stale.push(keys::refresh(&refresh_digest));
            fresh
        } else {
            refresh.to_string()
        };

        let json = serde_json::to_string(&record)?;
        let mut entries = vec![
            (keys::session(session_id), json.clone(), session_ttl),
            (keys::access(&record.access_digest), json, access_ttl),
        ];
        if rotate {
            entries.push((
                keys::refresh(&record.refresh_digest),
                session_id.to_string(),
                session_ttl,
            ));
        }

        // Once the record is written the old access entry no longer
        // resolves, so a failed cleanup only leaves garbage behind.
        self.cache.set_many(&entries).await?;
        if let Err(e) = self.cache.delete_many(&stale).await {
            warn!(%session_id, error = %e, "Failed to delete superseded credentials");
        }

        let credentials = IssuedCredentials {
            session_id,
            access,
            refresh: new_refresh,
            expires_at: after(now, access_ttl),
            refresh_expires_at: record.expires_at,
        };
        Ok((credentials, record))
    }

    /// Fetch a session record by id.
    pub async fn get(&self, session_id: SessionId) -> AppResult<Option<SessionRecord>> {
        match self.cache.get(&keys::session(session_id)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Delete a session, both of its credentials and its principal index
    /// entry in one atomic delete.
    ///
    /// Revoking an unknown session is `Ok(None)`.
    pub async fn revoke(
        &self,
        session_id: SessionId,
        reason: SessionEndReason,
    ) -> AppResult<Option<SessionRecord>> {
        let revoked = self
            .serialized(session_id, self.delete_session(session_id))
            .await?;

        let Some(record) = revoked else {
            debug!(%session_id, "Revoke of unknown session");
            return Ok(None);
        };

        if let Err(e) = self.audit.record_finished(&record, reason).await {
            warn!(%session_id, error = %e, "Failed to audit session end");
        }

        info!(%session_id, principal_id = %record.principal_id, %reason, "Session revoked");
        Ok(Some(record))
    }

    async fn delete_session(&self, session_id: SessionId) -> AppResult<Option<SessionRecord>> {
        let Some(record) = self.get(session_id).await? else {
            return Ok(None);
        };
        let doomed = vec![
            keys::session(session_id),
            keys::access(&record.access_digest),
            keys::refresh(&record.refresh_digest),
            principal_index(&record),
        ];
        self.cache.delete_many(&doomed).await?;
        Ok(Some(record))
    }

    /// Every durable session of one principal, oldest first.
    pub async fn sessions_of(&self, principal_id: &PrincipalId) -> AppResult<Vec<SessionRecord>> {
        let pattern = keys::principal_sessions(&credential::digest(principal_id.as_str()));
        let found = self.cache.keys(&pattern).await?;
        let mut records = self
            .load(found.iter().map(|key| (key, keys::session_id_from_principal_key(key))))
            .await?;
        records.sort_by(|a, b| (a.started_at, a.session_id).cmp(&(b.started_at, b.session_id)));
        Ok(records)
    }

    /// Every session currently in the durable store.
    pub async fn load_all(&self) -> AppResult<Vec<SessionRecord>> {
        let found = self.cache.keys(&keys::all_sessions()).await?;
        self.load(found.iter().map(|key| (key, keys::session_id_from_key(key))))
            .await
    }

    /// Read the records behind a set of keys, skipping any that are malformed
    /// or gone.
    async fn load<'a>(
        &self,
        ids: impl Iterator<Item = (&'a String, Option<&'a str>)>,
    ) -> AppResult<Vec<SessionRecord>> {
        let mut records = Vec::new();
        for (key, id) in ids {
            let Some(session_id) = id.and_then(|id| id.parse::<SessionId>().ok()) else {
                warn!(key = %key, "Skipping key without a session id");
                continue;
            };
            match self.get(session_id).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) if e.kind == ErrorKind::Serialization => {
                    warn!(key = %key, error = %e, "Skipping unreadable session record");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }

    async fn serialized<T>(
        &self,
        session_id: SessionId,
        work: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        let gate = Arc::clone(&self.writers.entry(session_id).or_default());
        let result = {
            let _held = gate.lock().await;
            work.await
        };
        drop(gate);
        self.writers
            .remove_if(&session_id, |_, g| Arc::strong_count(g) == 1);
        result
    }

    fn access_ttl(&self, session_ttl: Duration) -> Duration {
        Duration::from_secs(self.config.access_ttl_seconds).min(session_ttl)
    }
}

fn principal_index(record: &SessionRecord) -> String {
    keys::principal_session(
        &credential::digest(record.principal_id.as_str()),
        record.session_id,
    )
}

fn after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use gateway_cache::memory::MemoryCacheProvider;
    use gateway_core::error::ErrorKind;
    use gateway_core::types::TenantId;

    use crate::audit::TracingAuditSink;

    fn store_with(cache: Arc<dyn CacheProvider>) -> SessionStore {
        SessionStore::new(cache, Arc::new(TracingAuditSink), AuthConfig::default())
    }

    fn scope() -> AuthScope {
        AuthScope {
            tenant_id: TenantId::from("acme"),
            role: "clerk".to_string(),
        }
    }

    async fn issue(store: &SessionStore) -> (IssuedCredentials, SessionRecord) {
        store
            .issue(&PrincipalId::from("42"), scope(), SessionMetadata::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_issue_then_validate() {
        let store = store_with(Arc::new(MemoryCacheProvider::default()));
        let (creds, record) = issue(&store).await;

        let validated = store.validate(&creds.access).await.unwrap();
        assert_eq!(validated.session_id, record.session_id);
        assert_eq!(validated.principal_id.as_str(), "42");
        assert!(creds.expires_at <= creds.refresh_expires_at);
    }

    #[tokio::test]
    async fn test_refresh_credential_is_not_an_access_credential() {
        let store = store_with(Arc::new(MemoryCacheProvider::default()));
        let (creds, _) = issue(&store).await;

        let err = store.validate(&creds.refresh).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn test_malformed_credential_is_validation_error() {
        let store = store_with(Arc::new(MemoryCacheProvider::default()));
        let err = store.validate("not-a-credential").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_refresh_invalidates_prior_access() {
        let store = store_with(Arc::new(MemoryCacheProvider::default()));
        let (creds, record) = issue(&store).await;

        let (fresh, refreshed) = store.refresh(&creds.refresh, false).await.unwrap();
        assert_eq!(fresh.session_id, record.session_id);
        assert_eq!(fresh.refresh, creds.refresh);
        assert_eq!(refreshed.started_at, record.started_at);

        let err = store.validate(&creds.access).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert_eq!(
            store.validate(&fresh.access).await.unwrap().session_id,
            record.session_id
        );
    }

    #[tokio::test]
    async fn test_rotating_refresh_retires_old_refresh() {
        let store = store_with(Arc::new(MemoryCacheProvider::default()));
        let (creds, _) = issue(&store).await;

        let (fresh, _) = store.refresh(&creds.refresh, true).await.unwrap();
        assert_ne!(fresh.refresh, creds.refresh);

        let err = store.refresh(&creds.refresh, true).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
        store.refresh(&fresh.refresh, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = store_with(Arc::new(MemoryCacheProvider::default()));
        let (creds, record) = issue(&store).await;

        let revoked = store
            .revoke(record.session_id, SessionEndReason::Logout)
            .await
            .unwrap();
        assert_eq!(revoked.map(|r| r.session_id), Some(record.session_id));

        assert!(store
            .revoke(record.session_id, SessionEndReason::Logout)
            .await
            .unwrap()
            .is_none());
        assert!(store.validate(&creds.access).await.is_err());
        assert!(store.refresh(&creds.refresh, false).await.is_err());
    }

    #[tokio::test]
    async fn test_load_all_returns_every_session() {
        let store = store_with(Arc::new(MemoryCacheProvider::default()));
        let (_, a) = issue(&store).await;
        let (_, b) = issue(&store).await;

        let mut ids: Vec<SessionId> = store
            .load_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.session_id)
            .collect();
        ids.sort();
        let mut expected = vec![a.session_id, b.session_id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_load_all_skips_keys_without_a_session_id() {
        let cache = Arc::new(MemoryCacheProvider::default());
        let store = store_with(cache.clone());
        let (_, record) = issue(&store).await;
        cache
            .set(&keys::session("not-a-uuid"), "{}", Duration::from_secs(60))
            .await
            .unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].session_id, record.session_id);
    }

    #[derive(Debug, Default)]
    struct ReadOnlyCache(MemoryCacheProvider);

    #[async_trait]
    impl CacheProvider for ReadOnlyCache {
        async fn get(&self, key: &str) -> AppResult<Option<String>> {
            self.0.get(key).await
        }
        async fn set(&self, _: &str, _: &str, _: Duration) -> AppResult<()> {
            Err(AppError::cache("read only"))
        }
        async fn set_many(&self, _: &[(String, String, Duration)]) -> AppResult<()> {
            Err(AppError::cache("read only"))
        }
        async fn delete(&self, key: &str) -> AppResult<()> {
            self.0.delete(key).await
        }
        async fn delete_many(&self, keys: &[String]) -> AppResult<u64> {
            self.0.delete_many(keys).await
        }
        async fn exists(&self, key: &str) -> AppResult<bool> {
            self.0.exists(key).await
        }
        async fn keys(&self, pattern: &str) -> AppResult<Vec<String>> {
            self.0.keys(pattern).await
        }
        async fn health_check(&self) -> AppResult<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_failed_write_leaves_nothing_behind() {
        let cache = Arc::new(ReadOnlyCache::default());
        let store = store_with(cache.clone());

        let err = store
            .issue(&PrincipalId::from("42"), scope(), SessionMetadata::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cache);
        assert!(cache.keys("*").await.unwrap().is_empty());
    }

    /// Yields to the scheduler around reads and writes so concurrent callers
    /// interleave, and can refuse deletes.
    #[derive(Debug, Default)]
    struct InterleavingCache {
        inner: MemoryCacheProvider,
        fail_deletes: bool,
    }

    #[async_trait]
    impl CacheProvider for InterleavingCache {
        async fn get(&self, key: &str) -> AppResult<Option<String>> {
            tokio::task::yield_now().await;
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
            self.inner.set(key, value, ttl).await
        }
        async fn set_many(&self, entries: &[(String, String, Duration)]) -> AppResult<()> {
            tokio::task::yield_now().await;
            self.inner.set_many(entries).await
        }
        async fn delete(&self, key: &str) -> AppResult<()> {
            self.inner.delete(key).await
        }
        async fn delete_many(&self, keys: &[String]) -> AppResult<u64> {
            if self.fail_deletes {
                return Err(AppError::cache("delete refused"));
            }
            self.inner.delete_many(keys).await
        }
        async fn exists(&self, key: &str) -> AppResult<bool> {
            self.inner.exists(key).await
        }
        async fn keys(&self, pattern: &str) -> AppResult<Vec<String>> {
            self.inner.keys(pattern).await
        }
        async fn health_check(&self) -> AppResult<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_leave_one_live_access() {
        let store = store_with(Arc::new(InterleavingCache::default()));
        let (creds, record) = issue(&store).await;

        let (first, second) = tokio::join!(
            store.refresh(&creds.refresh, false),
            store.refresh(&creds.refresh, false)
        );
        let (first, second) = (first.unwrap().0, second.unwrap().0);

        let live: Vec<bool> = vec![
            store.validate(&first.access).await.is_ok(),
            store.validate(&second.access).await.is_ok(),
        ];
        assert_eq!(live.iter().filter(|ok| **ok).count(), 1);

        store
            .revoke(record.session_id, SessionEndReason::Logout)
            .await
            .unwrap();
        assert!(store.validate(&first.access).await.is_err());
        assert!(store.validate(&second.access).await.is_err());
    }

    #[tokio::test]
    async fn test_revoke_racing_refresh_leaves_nothing_valid() {
        let store = store_with(Arc::new(InterleavingCache::default()));
        let (creds, record) = issue(&store).await;

        let (refreshed, revoked) = tokio::join!(
            store.refresh(&creds.refresh, true),
            store.revoke(record.session_id, SessionEndReason::Logout)
        );
        revoked.unwrap();

        assert!(store.validate(&creds.access).await.is_err());
        if let Ok((fresh, _)) = refreshed {
            assert!(store.validate(&fresh.access).await.is_err());
            assert!(store.refresh(&fresh.refresh, true).await.is_err());
        }
        assert!(store.get(record.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_superseded_access_fails_even_if_its_entry_survives() {
        let cache = Arc::new(InterleavingCache {
            fail_deletes: true,
            ..InterleavingCache::default()
        });
        let store = store_with(cache.clone());
        let (creds, record) = issue(&store).await;

        let (fresh, _) = store.refresh(&creds.refresh, false).await.unwrap();

        let stale_key = keys::access(&credential::digest(&creds.access));
        assert!(cache.exists(&stale_key).await.unwrap());
        let err = store.validate(&creds.access).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert_eq!(
            store.validate(&fresh.access).await.unwrap().session_id,
            record.session_id
        );
    }

    #[tokio::test]
    async fn test_sessions_of_lists_only_that_principal() {
        let store = store_with(Arc::new(MemoryCacheProvider::default()));
        let (_, first) = issue(&store).await;
        let (_, second) = issue(&store).await;
        store
            .issue(&PrincipalId::from("43"), scope(), SessionMetadata::default())
            .await
            .unwrap();

        let ids: Vec<SessionId> = store
            .sessions_of(&PrincipalId::from("42"))
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.session_id)
            .collect();
        let mut expected = vec![first.clone(), second.clone()];
        expected.sort_by(|a, b| (a.started_at, a.session_id).cmp(&(b.started_at, b.session_id)));
        assert_eq!(ids, expected.iter().map(|r| r.session_id).collect::<Vec<_>>());

        store
            .revoke(first.session_id, SessionEndReason::Logout)
            .await
            .unwrap();
        let remaining = store.sessions_of(&PrincipalId::from("42")).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].session_id, second.session_id);
    }
}
