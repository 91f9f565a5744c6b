//! Request handlers, one module per domain.

pub mod auth;
pub mod health;
pub mod ws;
