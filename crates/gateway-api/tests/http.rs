//! Session endpoints driven through the router with an in-memory store.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use gateway_api::{AppState, build_router};
use gateway_auth::{
    ActiveSessionRegistry, SessionLimiter, SessionManager, SessionStore, SessionValidator,
    TracingAuditSink,
};
use gateway_cache::CacheManager;
use gateway_cache::memory::MemoryCacheProvider;
use gateway_core::config::AppConfig;
use gateway_core::error::AppError;
use gateway_core::result::AppResult;
use gateway_core::traits::{CacheProvider, PrincipalDirectory, SessionObserver};
use gateway_core::types::{GrantType, Principal, PrincipalId, TenantId};
use gateway_database::DatabasePool;
use gateway_realtime::{ConnectionHub, SessionTerminator, StaticPolicyEngine};

struct FakeDirectory;

#[async_trait]
impl PrincipalDirectory for FakeDirectory {
    async fn authenticate(&self, _: GrantType, username: &str, secret: &str) -> AppResult<Principal> {
        let (id, role) = match username {
            "pat" => ("42", "clerk"),
            "root" => ("1", "admin"),
            _ => return Err(AppError::authentication("Invalid username or password")),
        };
        if secret != "hunter2" {
            return Err(AppError::authentication("Invalid username or password"));
        }
        Ok(Principal {
            id: PrincipalId::from(id),
            tenant_id: TenantId::from("acme"),
            role: role.to_string(),
            username: username.to_string(),
        })
    }
}

fn app() -> Router {
    let config = AppConfig::default();

    let cache = Arc::new(CacheManager::from_provider(Arc::new(
        MemoryCacheProvider::default(),
    )));
    let store = Arc::new(SessionStore::new(
        Arc::clone(&cache) as Arc<dyn CacheProvider>,
        Arc::new(TracingAuditSink),
        config.auth.clone(),
    ));
    let registry = Arc::new(ActiveSessionRegistry::new());
    let hub = Arc::new(ConnectionHub::new(
        SessionValidator::new(Arc::clone(&store), Arc::clone(&registry)),
        Arc::new(StaticPolicyEngine::new(config.policy.clone())),
        config.realtime.clone(),
    ));
    let sessions = Arc::new(SessionManager::new(
        store,
        registry,
        SessionLimiter::new(config.session.limits.clone()),
        Arc::new(FakeDirectory),
        vec![Arc::new(SessionTerminator::new(Arc::clone(&hub))) as Arc<dyn SessionObserver>],
    ));

    build_router(AppState {
        database: DatabasePool::connect_lazy(&config.database).unwrap(),
        config: Arc::new(config),
        cache,
        sessions,
        hub,
        started_at: Instant::now(),
    })
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn login(app: &Router, path: &str, username: &str, remember: bool) -> (StatusCode, Value) {
    call(
        app,
        "POST",
        path,
        None,
        Some(json!({ "username": username, "password": "hunter2", "remember": remember })),
    )
    .await
}

#[tokio::test]
async fn login_then_inspect_session() {
    let app = app();
    let (status, body) = login(&app, "/api/auth/login", "pat", true).await;
    assert_eq!(status, StatusCode::OK);

    let data = &body["data"];
    assert_eq!(data["principal"]["id"], "42");
    assert_eq!(data["remember"], true);
    let access = data["access_token"].as_str().unwrap();
    assert_eq!(access.len(), 64);

    let (status, session) = call(&app, "GET", "/api/auth/session", Some(access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["data"]["session_id"], data["session_id"]);
    assert_eq!(session["data"]["role"], "clerk");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = app();
    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "pat", "password": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHORIZED");
}

#[tokio::test]
async fn empty_username_is_rejected() {
    let app = app();
    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "", "password": "hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn admin_login_requires_admin_role() {
    let app = app();
    let (status, _) = login(&app, "/api/auth/admin/login", "pat", false).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = login(&app, "/api/auth/admin/login", "root", true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["remember"], false);
}

#[tokio::test]
async fn refresh_replaces_the_access_token() {
    let app = app();
    let (_, body) = login(&app, "/api/auth/login", "pat", false).await;
    let old_access = body["data"]["access_token"].as_str().unwrap().to_string();
    let refresh = body["data"]["refresh_token"].as_str().unwrap().to_string();

    let (status, refreshed) = call(
        &app,
        "POST",
        "/api/auth/refresh",
        None,
        Some(json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let new_access = refreshed["data"]["access_token"].as_str().unwrap();
    assert_ne!(new_access, old_access);
    assert_eq!(refreshed["data"]["session_id"], body["data"]["session_id"]);

    let (status, _) = call(&app, "GET", "/api/auth/session", Some(&old_access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, "GET", "/api/auth/session", Some(new_access), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let app = app();
    let (_, body) = login(&app, "/api/auth/login", "pat", false).await;
    let access = body["data"]["access_token"].as_str().unwrap().to_string();

    let (status, _) = call(&app, "POST", "/api/auth/logout", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, "GET", "/api/auth/session", Some(&access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHORIZED");
}

#[tokio::test]
async fn missing_bearer_is_unauthorized() {
    let app = app();
    let (status, _) = call(&app, "POST", "/api/auth/logout", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn liveness_reports_version() {
    let app = app();
    let (status, body) = call(&app, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn websocket_ping_gets_exactly_one_pong() {
    use futures::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    let app = app();
    let (_, body) = login(&app, "/api/auth/login", "pat", false).await;
    let session_id = body["data"]["session_id"].as_str().unwrap().to_string();
    let access = body["data"]["access_token"].as_str().unwrap().to_string();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });

    let url = format!("ws://{addr}/ws?session_id={session_id}&token={access}");
    let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    socket.send(Message::Ping(b"hi".to_vec().into())).await.unwrap();

    let mut pongs = 0;
    while let Ok(Some(message)) =
        tokio::time::timeout(std::time::Duration::from_millis(500), socket.next()).await
    {
        if let Message::Pong(data) = message.unwrap() {
            assert_eq!(&data[..], b"hi");
            pongs += 1;
        }
    }
    assert_eq!(pongs, 1);
}
