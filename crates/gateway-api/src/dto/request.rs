//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Login request body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginBody {
    /// Username.
    #[validate(length(min = 1, max = 128, message = "Username is required"))]
    pub username: String,
    /// Password.
    #[serde(alias = "password")]
    #[validate(length(min = 1, max = 1024, message = "Password is required"))]
    pub secret: String,
    /// Keep the session alive across idle periods. Ignored for admin logins.
    #[serde(default)]
    pub remember: bool,
}

/// Token refresh request body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RefreshBody {
    /// Refresh token.
    #[validate(length(equal = 64, message = "Malformed refresh token"))]
    pub refresh_token: String,
}
