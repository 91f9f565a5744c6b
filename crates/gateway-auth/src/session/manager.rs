//! Session lifecycle manager: login, refresh, logout and forced termination.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use gateway_core::config::session::OverflowStrategy;
use gateway_core::error::AppError;
use gateway_core::events::SessionEndReason;
use gateway_core::result::AppResult;
use gateway_core::traits::{PrincipalDirectory, SessionObserver};
use gateway_core::types::{
    AuthScope, GrantType, IssuedCredentials, Principal, PrincipalId, SessionId, SessionMetadata,
    SessionRecord,
};

use super::limiter::SessionLimiter;
use super::registry::ActiveSessionRegistry;
use super::store::SessionStore;
use super::validator::SessionValidator;

/// Credentials presented at login.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    /// Login name.
    pub username: String,
    /// Secret (password).
    pub secret: String,
    /// Ask for a long-lived session. Ignored by grants that do not allow it.
    #[serde(default)]
    pub remember: bool,
    /// Client IP address.
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Client user agent.
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Result of a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    /// The freshly minted credential pair.
    pub credentials: IssuedCredentials,
    /// The created session.
    pub record: SessionRecord,
    /// The authenticated principal.
    pub principal: Principal,
    /// Sessions evicted to make room for this one.
    pub evicted: Vec<SessionId>,
}

/// Manages the complete session lifecycle.
///
/// Observers are fixed at construction and are told about every session that
/// ends, after its durable keys are gone.
pub struct SessionManager {
    store: Arc<SessionStore>,
    registry: Arc<ActiveSessionRegistry>,
    validator: SessionValidator,
    limiter: SessionLimiter,
    directory: Arc<dyn PrincipalDirectory>,
    observers: Vec<Arc<dyn SessionObserver>>,
    /// Serializes admission per principal so concurrent logins cannot both
    /// pass the limit check.
    admission: DashMap<PrincipalId, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("limiter", &self.limiter)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates a new session manager with all required dependencies.
    pub fn new(
        store: Arc<SessionStore>,
        registry: Arc<ActiveSessionRegistry>,
        limiter: SessionLimiter,
        directory: Arc<dyn PrincipalDirectory>,
        observers: Vec<Arc<dyn SessionObserver>>,
    ) -> Self {
        let validator = SessionValidator::new(Arc::clone(&store), Arc::clone(&registry));
        Self {
            store,
            registry,
            validator,
            limiter,
            directory,
            observers,
            admission: DashMap::new(),
        }
    }

    /// Authenticate and open a session.
    ///
    /// 1. Verify the secret through the principal directory
    /// 2. Check the grant is allowed for the principal's role
    /// 3. Under the principal's admission lock, register any of its durable
    ///    sessions the registry has released, then apply the concurrency
    ///    limit (evict the oldest sessions, or deny)
    /// 4. Issue credentials and register the session
    pub async fn login(&self, grant: GrantType, request: LoginRequest) -> AppResult<LoginOutcome> {
        let principal = self
            .directory
            .authenticate(grant, &request.username, &request.secret)
            .await?;

        if grant == GrantType::Admin && !self.store.config().is_admin_role(&principal.role) {
            warn!(principal_id = %principal.id, role = %principal.role, "Admin grant refused");
            return Err(AppError::authorization("Role is not permitted to use the admin login"));
        }

        let metadata = SessionMetadata {
            ip_address: request.ip_address,
            user_agent: request.user_agent,
            remember: request.remember && grant.allows_remember(),
        };

        let gate = Arc::clone(&self.admission.entry(principal.id.clone()).or_default());
        let result = {
            let _admitted = gate.lock().await;
            self.admit(&principal, metadata).await
        };
        drop(gate);
        self.admission
            .remove_if(&principal.id, |_, g| Arc::strong_count(g) == 1);

        let (credentials, record, evicted) = result?;
        info!(
            session_id = %record.session_id,
            principal_id = %principal.id,
            %grant,
            evicted = evicted.len(),
            "Login successful"
        );

        Ok(LoginOutcome {
            credentials,
            record,
            principal,
            evicted,
        })
    }

    async fn admit(
        &self,
        principal: &Principal,
        metadata: SessionMetadata,
    ) -> AppResult<(IssuedCredentials, SessionRecord, Vec<SessionId>)> {
        // Released remember sessions still hold live credentials.
        for mut record in self.store.sessions_of(&principal.id).await? {
            if self.registry.get_by_id(&record.session_id).await.is_none() {
                record.connected = false;
                self.registry.insert(record).await;
            }
        }

        let limit = self.limiter.resolve_limit(&principal.role);
        let active = self.registry.count_by_principal(&principal.id).await;
        let mut evicted = Vec::new();

        if limit.is_exceeded_by(active) {
            match self.limiter.overflow_strategy() {
                OverflowStrategy::Deny => {
                    warn!(principal_id = %principal.id, active, "Session limit reached, login denied");
                    return Err(AppError::conflict(format!(
                        "Concurrent session limit of {} reached",
                        limit.as_max().unwrap_or_default()
                    )));
                }
                OverflowStrategy::KickOldest => {
                    for _ in 0..limit.overflow(active) {
                        let Some(oldest) = self.registry.oldest_by_principal(&principal.id).await
                        else {
                            break;
                        };
                        warn!(
                            principal_id = %principal.id,
                            session_id = %oldest.session_id,
                            "Session limit reached, evicting oldest session"
                        );
                        self.end_session(oldest.session_id, SessionEndReason::LimitExceeded)
                            .await?;
                        evicted.push(oldest.session_id);
                    }
                }
            }
        }

        let scope = AuthScope {
            tenant_id: principal.tenant_id.clone(),
            role: principal.role.clone(),
        };
        let (credentials, record) = self.store.issue(&principal.id, scope, metadata).await?;
        self.registry.insert(record.clone()).await;

        Ok((credentials, record, evicted))
    }

    /// Validate an access credential and touch its session.
    pub async fn validate(&self, access: &str) -> AppResult<SessionRecord> {
        self.validator.validate(access).await
    }

    /// Mint a new access credential from a refresh credential.
    pub async fn refresh(&self, refresh: &str) -> AppResult<(IssuedCredentials, SessionRecord)> {
        let rotate = self.store.config().rotate_refresh;
        let (credentials, mut record) = self.store.refresh(refresh, rotate).await?;

        if let Some(current) = self.registry.get_by_id(&record.session_id).await {
            record.connected = current.connected;
        }
        self.registry.insert(record.clone()).await;

        Ok((credentials, record))
    }

    /// End a session at the principal's request.
    pub async fn logout(&self, session_id: SessionId) -> AppResult<Option<SessionRecord>> {
        self.end_session(session_id, SessionEndReason::Logout).await
    }

    /// Revoke a session durably, drop it from the registry and tell every
    /// observer. Ending an unknown session is `Ok(None)`.
    pub async fn end_session(
        &self,
        session_id: SessionId,
        reason: SessionEndReason,
    ) -> AppResult<Option<SessionRecord>> {
        let durable = self.store.revoke(session_id, reason).await?;
        let registered = self.registry.remove(&session_id).await;

        let Some(record) = durable.or(registered) else {
            return Ok(None);
        };

        for observer in &self.observers {
            observer.session_ended(&record, reason);
        }
        Ok(Some(record))
    }

    /// Drop a session from the registry only; its durable keys stay valid.
    pub async fn release(&self, session_id: &SessionId) -> Option<SessionRecord> {
        self.registry.remove(session_id).await
    }

    /// Repopulate the registry from the durable store after a restart.
    pub async fn rebuild_registry(&self) -> AppResult<usize> {
        let records = self.store.load_all().await?;
        let count = records.len();
        for mut record in records {
            record.connected = false;
            self.registry.insert(record).await;
        }
        info!(count, "Session registry rebuilt from durable store");
        Ok(count)
    }

    /// The shared registry.
    pub fn registry(&self) -> &Arc<ActiveSessionRegistry> {
        &self.registry
    }

    /// The credential validator shared with the realtime hub.
    pub fn validator(&self) -> &SessionValidator {
        &self.validator
    }
}
