//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use gateway_auth::SessionManager;
use gateway_cache::CacheManager;
use gateway_core::config::AppConfig;
use gateway_database::DatabasePool;
use gateway_realtime::ConnectionHub;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Durable session store (Redis or in-memory)
    pub cache: Arc<CacheManager>,
    /// PostgreSQL connection pool
    pub database: DatabasePool,
    /// Session lifecycle manager
    pub sessions: Arc<SessionManager>,
    /// Realtime connection hub
    pub hub: Arc<ConnectionHub>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}
