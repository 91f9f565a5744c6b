//! # gateway-core
//!
//! Core crate for the commerce gateway. Contains configuration schemas,
//! typed identifiers, the session record, session lifecycle events,
//! the collaborator traits consulted by the session and realtime layers,
//! and the unified error system.
//!
//! This crate has **no** internal dependencies on other gateway crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
