//! # gateway-api
//!
//! Axum HTTP surface of the commerce gateway: login by grant type, refresh,
//! logout, health, and the WebSocket upgrade that hands sockets to the
//! realtime hub.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
