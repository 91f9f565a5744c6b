//! Custom extractors.

pub mod auth;

pub use auth::{AuthSession, ClientOrigin};
