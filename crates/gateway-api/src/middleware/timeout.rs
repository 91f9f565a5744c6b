//! Per-request deadline for the REST routes.

use std::time::Duration;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use gateway_core::error::AppError;

use crate::error::ApiError;
use crate::state::AppState;

/// Fails the request with 503 if the handler runs past
/// `server.request_timeout_seconds`.
pub async fn request_timeout(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let limit = Duration::from_secs(state.config.server.request_timeout_seconds.max(1));
    let path = request.uri().path().to_string();

    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(path = %path, timeout_secs = limit.as_secs(), "Request timed out");
            ApiError(AppError::service_unavailable("Request timed out")).into_response()
        }
    }
}
