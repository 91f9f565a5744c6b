//! End-to-end session lifecycle against the in-memory durable store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use gateway_auth::{
    ActiveSessionRegistry, IdleSessionMonitor, LoginRequest, SessionLimiter, SessionManager,
    SessionStore, TracingAuditSink,
};
use gateway_cache::memory::MemoryCacheProvider;
use gateway_core::config::auth::AuthConfig;
use gateway_core::config::session::{OverflowStrategy, SessionLimitsConfig};
use gateway_core::error::{AppError, ErrorKind};
use gateway_core::events::SessionEndReason;
use gateway_core::result::AppResult;
use gateway_core::traits::{PrincipalDirectory, SessionObserver};
use gateway_core::types::{GrantType, Principal, PrincipalId, SessionId, SessionRecord, TenantId};

struct FakeDirectory {
    principals: HashMap<String, (String, Principal)>,
}

impl FakeDirectory {
    fn new() -> Self {
        let mut principals = HashMap::new();
        for (username, id, role) in [("pat", "42", "clerk"), ("root", "1", "admin")] {
            principals.insert(
                username.to_string(),
                (
                    "hunter2".to_string(),
                    Principal {
                        id: PrincipalId::from(id),
                        tenant_id: TenantId::from("acme"),
                        role: role.to_string(),
                        username: username.to_string(),
                    },
                ),
            );
        }
        Self { principals }
    }
}

#[async_trait]
impl PrincipalDirectory for FakeDirectory {
    async fn authenticate(&self, _: GrantType, username: &str, secret: &str) -> AppResult<Principal> {
        match self.principals.get(username) {
            Some((expected, principal)) if expected == secret => Ok(principal.clone()),
            _ => Err(AppError::authentication("Invalid username or password")),
        }
    }
}

#[derive(Default)]
struct RecordingObserver {
    ended: Mutex<Vec<(SessionId, SessionEndReason)>>,
}

impl RecordingObserver {
    fn ended(&self) -> Vec<(SessionId, SessionEndReason)> {
        self.ended.lock().unwrap().clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn session_ended(&self, record: &SessionRecord, reason: SessionEndReason) {
        self.ended.lock().unwrap().push((record.session_id, reason));
    }
}

struct Harness {
    manager: Arc<SessionManager>,
    registry: Arc<ActiveSessionRegistry>,
    store: Arc<SessionStore>,
    observer: Arc<RecordingObserver>,
}

fn harness(max: u32, strategy: OverflowStrategy) -> Harness {
    let cache = Arc::new(MemoryCacheProvider::default());
    let store = Arc::new(SessionStore::new(
        cache,
        Arc::new(TracingAuditSink),
        AuthConfig::default(),
    ));
    let registry = Arc::new(ActiveSessionRegistry::new());
    let observer = Arc::new(RecordingObserver::default());
    let limiter = SessionLimiter::new(SessionLimitsConfig {
        overflow_strategy: strategy,
        default_max: max,
        by_role: HashMap::new(),
    });
    let manager = Arc::new(SessionManager::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        limiter,
        Arc::new(FakeDirectory::new()),
        vec![observer.clone() as Arc<dyn SessionObserver>],
    ));
    Harness {
        manager,
        registry,
        store,
        observer,
    }
}

fn login_as(username: &str) -> LoginRequest {
    LoginRequest {
        username: username.to_string(),
        secret: "hunter2".to_string(),
        ..LoginRequest::default()
    }
}

async fn backdate(registry: &ActiveSessionRegistry, id: SessionId, minutes: i64) {
    let mut record = registry.get_by_id(&id).await.unwrap();
    record.last_activity = Utc::now() - chrono::Duration::minutes(minutes);
    registry.insert(record).await;
}

#[tokio::test]
async fn second_login_evicts_first_when_limit_is_one() {
    let h = harness(1, OverflowStrategy::KickOldest);

    let a = h.manager.login(GrantType::User, login_as("pat")).await.unwrap();
    let b = h.manager.login(GrantType::User, login_as("pat")).await.unwrap();

    assert_eq!(b.evicted, vec![a.record.session_id]);
    let err = h.manager.validate(&a.credentials.access).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);
    assert_eq!(
        h.manager.validate(&b.credentials.access).await.unwrap().session_id,
        b.record.session_id
    );
    assert_eq!(h.registry.count_by_principal(&PrincipalId::from("42")).await, 1);
    assert_eq!(
        h.observer.ended(),
        vec![(a.record.session_id, SessionEndReason::LimitExceeded)]
    );
}

#[tokio::test]
async fn eviction_picks_earliest_started_session() {
    let h = harness(2, OverflowStrategy::KickOldest);

    let first = h.manager.login(GrantType::User, login_as("pat")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = h.manager.login(GrantType::User, login_as("pat")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let third = h.manager.login(GrantType::User, login_as("pat")).await.unwrap();

    assert_eq!(third.evicted, vec![first.record.session_id]);
    assert!(h.registry.get_by_id(&second.record.session_id).await.is_some());
    assert!(h.registry.get_by_id(&first.record.session_id).await.is_none());
}

#[tokio::test]
async fn deny_strategy_rejects_login_over_limit() {
    let h = harness(1, OverflowStrategy::Deny);

    let a = h.manager.login(GrantType::User, login_as("pat")).await.unwrap();
    let err = h
        .manager
        .login(GrantType::User, login_as("pat"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Conflict);
    h.manager.validate(&a.credentials.access).await.unwrap();
    assert!(h.observer.ended().is_empty());
}

#[tokio::test]
async fn limits_are_per_principal() {
    let h = harness(1, OverflowStrategy::KickOldest);

    let pat = h.manager.login(GrantType::User, login_as("pat")).await.unwrap();
    let root = h.manager.login(GrantType::User, login_as("root")).await.unwrap();

    assert!(root.evicted.is_empty());
    h.manager.validate(&pat.credentials.access).await.unwrap();
}

#[tokio::test]
async fn concurrent_logins_never_exceed_limit() {
    let h = harness(1, OverflowStrategy::KickOldest);

    let (a, b) = tokio::join!(
        h.manager.login(GrantType::User, login_as("pat")),
        h.manager.login(GrantType::User, login_as("pat")),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(h.registry.count_by_principal(&PrincipalId::from("42")).await, 1);
    assert_eq!(h.store.load_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn wrong_secret_and_admin_grant_are_refused() {
    let h = harness(3, OverflowStrategy::KickOldest);

    let mut bad = login_as("pat");
    bad.secret = "nope".to_string();
    let err = h.manager.login(GrantType::User, bad).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);

    let err = h
        .manager
        .login(GrantType::Admin, login_as("pat"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authorization);

    h.manager.login(GrantType::Admin, login_as("root")).await.unwrap();
}

#[tokio::test]
async fn admin_grant_ignores_remember() {
    let h = harness(3, OverflowStrategy::KickOldest);
    let mut request = login_as("root");
    request.remember = true;

    let outcome = h.manager.login(GrantType::Admin, request).await.unwrap();
    assert!(!outcome.record.remember);
}

#[tokio::test]
async fn logout_removes_session_everywhere() {
    let h = harness(3, OverflowStrategy::KickOldest);
    let a = h.manager.login(GrantType::User, login_as("pat")).await.unwrap();

    let ended = h.manager.logout(a.record.session_id).await.unwrap();
    assert!(ended.is_some());
    assert!(h.registry.get_by_id(&a.record.session_id).await.is_none());

    let err = h.manager.validate(&a.credentials.access).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);
    assert!(h.manager.logout(a.record.session_id).await.unwrap().is_none());
}

#[tokio::test]
async fn refresh_invalidates_prior_access_credential() {
    let h = harness(3, OverflowStrategy::KickOldest);
    let a = h.manager.login(GrantType::User, login_as("pat")).await.unwrap();

    let (fresh, record) = h.manager.refresh(&a.credentials.refresh).await.unwrap();
    assert_eq!(record.session_id, a.record.session_id);

    let err = h.manager.validate(&a.credentials.access).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);
    assert_eq!(
        h.manager.validate(&fresh.access).await.unwrap().session_id,
        a.record.session_id
    );
}

#[tokio::test]
async fn idle_sweep_spares_connected_sessions() {
    let h = harness(5, OverflowStrategy::KickOldest);
    let idle = h.manager.login(GrantType::User, login_as("pat")).await.unwrap();
    let live = h.manager.login(GrantType::User, login_as("pat")).await.unwrap();
    let fresh = h.manager.login(GrantType::User, login_as("pat")).await.unwrap();

    backdate(&h.registry, idle.record.session_id, 10).await;
    backdate(&h.registry, live.record.session_id, 10).await;
    h.registry.set_connected(&live.record.session_id, true).await;

    let monitor = IdleSessionMonitor::new(
        Arc::clone(&h.manager),
        Duration::from_secs(60),
        Duration::from_secs(300),
    );
    let report = monitor.run_once().await;

    assert_eq!(report.revoked, 1);
    assert!(h.manager.validate(&idle.credentials.access).await.is_err());
    h.manager.validate(&live.credentials.access).await.unwrap();
    h.manager.validate(&fresh.credentials.access).await.unwrap();
    assert_eq!(
        h.observer.ended(),
        vec![(idle.record.session_id, SessionEndReason::Idle)]
    );
}

#[tokio::test]
async fn idle_remember_session_is_released_not_revoked() {
    let h = harness(5, OverflowStrategy::KickOldest);
    let mut request = login_as("pat");
    request.remember = true;
    let kept = h.manager.login(GrantType::User, request).await.unwrap();
    backdate(&h.registry, kept.record.session_id, 10).await;

    let monitor = IdleSessionMonitor::new(
        Arc::clone(&h.manager),
        Duration::from_secs(60),
        Duration::from_secs(300),
    );
    let report = monitor.run_once().await;

    assert_eq!(report.released, 1);
    assert!(h.registry.get_by_id(&kept.record.session_id).await.is_none());

    let record = h.manager.validate(&kept.credentials.access).await.unwrap();
    assert_eq!(record.session_id, kept.record.session_id);
    assert!(h.registry.get_by_id(&kept.record.session_id).await.is_some());
}

async fn release_idle_remember_session(h: &Harness) -> gateway_auth::LoginOutcome {
    let mut request = login_as("pat");
    request.remember = true;
    let released = h.manager.login(GrantType::User, request).await.unwrap();
    backdate(&h.registry, released.record.session_id, 10).await;

    let report = IdleSessionMonitor::new(
        Arc::clone(&h.manager),
        Duration::from_secs(60),
        Duration::from_secs(300),
    )
    .run_once()
    .await;
    assert_eq!(report.released, 1);
    released
}

#[tokio::test]
async fn released_remember_session_still_counts_toward_limit() {
    let h = harness(1, OverflowStrategy::KickOldest);
    let released = release_idle_remember_session(&h).await;

    let second = h.manager.login(GrantType::User, login_as("pat")).await.unwrap();
    assert_eq!(second.evicted, vec![released.record.session_id]);

    let err = h.manager.validate(&released.credentials.access).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);
    assert!(h.manager.validate(&second.credentials.access).await.is_ok());
    assert_eq!(h.registry.count_by_principal(&PrincipalId::from("42")).await, 1);
    assert_eq!(h.store.sessions_of(&PrincipalId::from("42")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn released_remember_session_blocks_login_under_deny() {
    let h = harness(1, OverflowStrategy::Deny);
    let released = release_idle_remember_session(&h).await;

    let err = h
        .manager
        .login(GrantType::User, login_as("pat"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert!(h.manager.validate(&released.credentials.access).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn monitor_evicts_within_one_interval() {
    let h = harness(5, OverflowStrategy::KickOldest);
    let idle = h.manager.login(GrantType::User, login_as("pat")).await.unwrap();
    backdate(&h.registry, idle.record.session_id, 10).await;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = IdleSessionMonitor::new(
        Arc::clone(&h.manager),
        Duration::from_secs(60),
        Duration::from_secs(300),
    )
    .spawn(shutdown_rx);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(h.registry.get_by_id(&idle.record.session_id).await.is_some());

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(h.registry.get_by_id(&idle.record.session_id).await.is_none());

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn registry_rebuilds_from_durable_store() {
    let h = harness(5, OverflowStrategy::KickOldest);
    let a = h.manager.login(GrantType::User, login_as("pat")).await.unwrap();
    let b = h.manager.login(GrantType::User, login_as("root")).await.unwrap();

    let restarted_registry = Arc::new(ActiveSessionRegistry::new());
    let restarted = SessionManager::new(
        Arc::clone(&h.store),
        Arc::clone(&restarted_registry),
        SessionLimiter::new(SessionLimitsConfig::default()),
        Arc::new(FakeDirectory::new()),
        Vec::new(),
    );

    assert_eq!(restarted.rebuild_registry().await.unwrap(), 2);
    assert!(restarted_registry.get_by_id(&a.record.session_id).await.is_some());
    assert!(restarted_registry.get_by_id(&b.record.session_id).await.is_some());
}
