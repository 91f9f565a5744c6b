//! Shared fixtures: an in-memory session stack, a hub and a channel-backed
//! transport standing in for a WebSocket.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc;
use serde_json::Value;

use gateway_auth::{
    ActiveSessionRegistry, LoginOutcome, LoginRequest, SessionLimiter, SessionManager,
    SessionStore, SessionValidator, TracingAuditSink,
};
use gateway_cache::memory::MemoryCacheProvider;
use gateway_core::config::auth::AuthConfig;
use gateway_core::config::policy::{PolicyConfig, PolicyGrant};
use gateway_core::config::realtime::RealtimeConfig;
use gateway_core::config::session::{OverflowStrategy, SessionLimitsConfig};
use gateway_core::error::AppError;
use gateway_core::result::AppResult;
use gateway_core::traits::{PrincipalDirectory, SessionObserver};
use gateway_core::types::{GrantType, Principal, PrincipalId, TenantId};
use gateway_realtime::{
    Client, ConnectRequest, ConnectionHub, Frame, RealtimeError, SessionTerminator,
    StaticPolicyEngine,
};

pub struct FakeDirectory;

#[async_trait]
impl PrincipalDirectory for FakeDirectory {
    async fn authenticate(&self, _: GrantType, username: &str, secret: &str) -> AppResult<Principal> {
        let id = match username {
            "pat" => "42",
            "sam" => "43",
            _ => return Err(AppError::authentication("Invalid username or password")),
        };
        if secret != "hunter2" {
            return Err(AppError::authentication("Invalid username or password"));
        }
        Ok(Principal {
            id: PrincipalId::from(id),
            tenant_id: TenantId::from("acme"),
            role: "clerk".to_string(),
            username: username.to_string(),
        })
    }
}

pub struct Harness {
    pub manager: Arc<SessionManager>,
    pub hub: Arc<ConnectionHub>,
    pub registry: Arc<ActiveSessionRegistry>,
}

pub fn realtime_config(interval_secs: u64, deadline_secs: u64) -> RealtimeConfig {
    RealtimeConfig {
        heartbeat_interval_seconds: interval_secs,
        read_deadline_seconds: deadline_secs,
        ..RealtimeConfig::default()
    }
}

pub fn harness(max_sessions: u32, realtime: RealtimeConfig) -> Harness {
    let store = Arc::new(SessionStore::new(
        Arc::new(MemoryCacheProvider::default()),
        Arc::new(TracingAuditSink),
        AuthConfig::default(),
    ));
    let registry = Arc::new(ActiveSessionRegistry::new());
    let validator = SessionValidator::new(Arc::clone(&store), Arc::clone(&registry));

    let policy = StaticPolicyEngine::new(PolicyConfig {
        grants: vec![PolicyGrant {
            tenant: None,
            role: "clerk".to_string(),
            resource: "orders".to_string(),
            actions: vec!["read".to_string()],
        }],
    });
    let hub = Arc::new(ConnectionHub::new(validator, Arc::new(policy), realtime));
    let terminator = SessionTerminator::new(Arc::clone(&hub));

    let limiter = SessionLimiter::new(SessionLimitsConfig {
        overflow_strategy: OverflowStrategy::KickOldest,
        default_max: max_sessions,
        by_role: HashMap::new(),
    });
    let manager = Arc::new(SessionManager::new(
        store,
        Arc::clone(&registry),
        limiter,
        Arc::new(FakeDirectory),
        vec![Arc::new(terminator) as Arc<dyn SessionObserver>],
    ));

    Harness {
        manager,
        hub,
        registry,
    }
}

pub async fn login(h: &Harness, username: &str) -> LoginOutcome {
    h.manager
        .login(
            GrantType::User,
            LoginRequest {
                username: username.to_string(),
                secret: "hunter2".to_string(),
                ..LoginRequest::default()
            },
        )
        .await
        .unwrap()
}

/// The test's end of a fake WebSocket.
pub struct Peer {
    pub to_server: mpsc::UnboundedSender<Result<Frame, String>>,
    pub from_server: mpsc::Receiver<Frame>,
}

impl Peer {
    pub fn send_text(&self, text: &str) {
        self.to_server
            .unbounded_send(Ok(Frame::Text(text.to_string())))
            .unwrap();
    }

    pub fn send(&self, frame: Frame) {
        self.to_server.unbounded_send(Ok(frame)).unwrap();
    }

    /// Next application message, skipping heartbeat probes.
    pub async fn next_message(&mut self) -> Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(30), self.from_server.next())
                .await
                .expect("timed out waiting for a message")
                .expect("transport closed");
            match frame {
                Frame::Text(text) => return serde_json::from_str(&text).unwrap(),
                Frame::Ping(_) => continue,
                other => panic!("unexpected frame {other:?}"),
            }
        }
    }

    /// Next frame of any kind, or `None` once the server side is gone.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        tokio::time::timeout(Duration::from_secs(30), self.from_server.next())
            .await
            .expect("timed out waiting for a frame")
    }
}

pub async fn connect_with(
    hub: &Arc<ConnectionHub>,
    session_id: String,
    token: String,
) -> (Result<Arc<Client>, RealtimeError>, Peer) {
    let (sink, from_server) = mpsc::channel::<Frame>(64);
    let (to_server, stream) = mpsc::unbounded::<Result<Frame, String>>();
    let result = hub
        .admit(ConnectRequest { session_id, token }, sink, stream)
        .await;
    (
        result,
        Peer {
            to_server,
            from_server,
        },
    )
}

pub async fn connect(
    hub: &Arc<ConnectionHub>,
    outcome: &LoginOutcome,
) -> (Result<Arc<Client>, RealtimeError>, Peer) {
    connect_with(
        hub,
        outcome.record.session_id.to_string(),
        outcome.credentials.access.clone(),
    )
    .await
}
