//! Health check handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use gateway_core::traits::CacheProvider;

use crate::dto::response::{ApiResponse, DetailedHealthResponse, HealthResponse};
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

/// GET /api/health/detailed
pub async fn health_detailed(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<DetailedHealthResponse>>) {
    let database = matches!(state.database.health_check().await, Ok(true));
    let cache = matches!(state.cache.health_check().await, Ok(true));

    let status = if database && cache {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let label = |up: bool| (if up { "connected" } else { "unavailable" }).to_string();

    let body = DetailedHealthResponse {
        status: (if status.is_success() { "ok" } else { "degraded" }).to_string(),
        database: label(database),
        cache: label(cache),
        active_sessions: state.sessions.registry().len().await,
        realtime_connections: state.hub.len().await,
    };
    (status, Json(ApiResponse::ok(body)))
}
