//! `AuthSession` extractor: resolves the bearer access token to a live session.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use gateway_core::error::AppError;
use gateway_core::types::SessionRecord;

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated session behind the request's bearer token.
#[derive(Debug, Clone)]
pub struct AuthSession(pub SessionRecord);

impl std::ops::Deref for AuthSession {
    type Target = SessionRecord;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::authentication("Missing Authorization header"))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::authentication("Invalid Authorization header format"))
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let record = state.sessions.validate(token).await?;
        Ok(AuthSession(record))
    }
}

/// Origin details recorded on new sessions.
#[derive(Debug, Clone, Default)]
pub struct ClientOrigin {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientOrigin {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let ip_address = header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .or_else(|| header("x-real-ip"))
            .map(String::from);

        Self {
            ip_address,
            user_agent: header("user-agent").map(String::from),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientOrigin {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
