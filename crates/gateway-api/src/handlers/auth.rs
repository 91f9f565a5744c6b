//! Auth handlers: login by grant type, refresh, logout, current session.

use axum::Json;
use axum::extract::State;
use validator::Validate;

use gateway_auth::LoginRequest;
use gateway_core::error::AppError;
use gateway_core::types::GrantType;

use crate::dto::request::{LoginBody, RefreshBody};
use crate::dto::response::{
    ApiResponse, LoginResponse, MessageResponse, SessionResponse, TokenResponse,
};
use crate::error::ApiError;
use crate::extractors::{AuthSession, ClientOrigin};
use crate::state::AppState;

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    origin: ClientOrigin,
    Json(body): Json<LoginBody>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    login_with(state, GrantType::User, origin, body).await
}

/// POST /api/auth/admin/login
pub async fn admin_login(
    State(state): State<AppState>,
    origin: ClientOrigin,
    Json(body): Json<LoginBody>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    login_with(state, GrantType::Admin, origin, body).await
}

async fn login_with(
    state: AppState,
    grant: GrantType,
    origin: ClientOrigin,
    body: LoginBody,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    body.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let outcome = state
        .sessions
        .login(
            grant,
            LoginRequest {
                username: body.username,
                secret: body.secret,
                remember: body.remember,
                ip_address: origin.ip_address,
                user_agent: origin.user_agent,
            },
        )
        .await?;

    Ok(Json(ApiResponse::ok(LoginResponse {
        tokens: outcome.credentials.into(),
        remember: outcome.record.remember,
        principal: outcome.principal.into(),
        evicted_sessions: outcome.evicted,
    })))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshBody>,
) -> Result<Json<ApiResponse<TokenResponse>>, ApiError> {
    body.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let (credentials, _record) = state.sessions.refresh(&body.refresh_token).await?;
    Ok(Json(ApiResponse::ok(credentials.into())))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.sessions.logout(auth.session_id).await?;

    Ok(Json(ApiResponse::ok(MessageResponse {
        message: "Logged out successfully".to_string(),
    })))
}

/// GET /api/auth/session
pub async fn current_session(auth: AuthSession) -> Json<ApiResponse<SessionResponse>> {
    Json(ApiResponse::ok(auth.0.into()))
}
