//! Commerce Gateway Server
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use gateway_api::{AppState, build_router};
use gateway_auth::{
    ActiveSessionRegistry, DatabasePrincipalDirectory, IdleSessionMonitor, SessionLimiter,
    SessionManager, SessionStore, SessionValidator,
};
use gateway_cache::CacheManager;
use gateway_core::config::AppConfig;
use gateway_core::error::AppError;
use gateway_core::traits::{CacheProvider, SessionObserver};
use gateway_database::DatabasePool;
use gateway_database::repositories::{PrincipalRepository, SessionAuditRepository};
use gateway_realtime::{ConnectionHub, SessionTerminator, StaticPolicyEngine};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Load configuration from `config/default.toml`, the `GATEWAY_ENV` overlay
/// and `GATEWAY__*` environment variables.
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("GATEWAY_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    info!(version = env!("CARGO_PKG_VERSION"), "Starting commerce gateway");

    // ── Step 1: Open file limit ──────────────────────────────────
    if config.realtime.raise_fd_limit {
        match gateway_realtime::fd_limit::raise_fd_limit() {
            Ok(limit) => info!(open_files = limit, "Open file limit ready"),
            Err(e) => warn!(error = %e, "Could not raise open file limit"),
        }
    }

    // ── Step 2: Database connection + schema ─────────────────────
    let database = DatabasePool::connect(&config.database).await?;

    // ── Step 3: Durable session store ────────────────────────────
    let cache = Arc::new(CacheManager::new(&config.cache).await?);

    // ── Step 4: Sessions ─────────────────────────────────────────
    let store = Arc::new(SessionStore::new(
        Arc::clone(&cache) as Arc<dyn CacheProvider>,
        Arc::new(SessionAuditRepository::new(database.pool().clone())),
        config.auth.clone(),
    ));
    let registry = Arc::new(ActiveSessionRegistry::new());
    let validator = SessionValidator::new(Arc::clone(&store), Arc::clone(&registry));
    let directory = Arc::new(DatabasePrincipalDirectory::new(PrincipalRepository::new(
        database.pool().clone(),
    )));

    // ── Step 5: Realtime hub ─────────────────────────────────────
    let policy = Arc::new(StaticPolicyEngine::new(config.policy.clone()));
    let hub = Arc::new(ConnectionHub::new(validator, policy, config.realtime.clone()));
    let terminator = Arc::new(SessionTerminator::new(Arc::clone(&hub)));

    let sessions = Arc::new(SessionManager::new(
        store,
        registry,
        SessionLimiter::new(config.session.limits.clone()),
        directory,
        vec![terminator as Arc<dyn SessionObserver>],
    ));
    sessions.rebuild_registry().await?;

    // ── Step 6: Idle session monitor ─────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor =
        IdleSessionMonitor::from_config(Arc::clone(&sessions), &config.session).spawn(shutdown_rx);

    // ── Step 7: HTTP server ──────────────────────────────────────
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let app = build_router(AppState {
        config: Arc::new(config),
        cache,
        database: database.clone(),
        sessions,
        hub: Arc::clone(&hub),
        started_at: Instant::now(),
    });

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
    info!(%addr, "Commerce gateway listening");

    // ── Step 8: Graceful shutdown ────────────────────────────────
    let shutdown_hub = Arc::clone(&hub);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, starting graceful shutdown");
            let _ = shutdown_tx.send(true);
            shutdown_hub.delete_all().await;
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    if tokio::time::timeout(grace, monitor).await.is_err() {
        warn!("Idle session monitor did not stop in time");
    }
    database.close().await;

    info!("Commerce gateway shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
