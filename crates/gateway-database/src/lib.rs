//! # gateway-database
//!
//! PostgreSQL access for the gateway: the connection pool, the embedded
//! schema bootstrap, the session audit trail and the principal table.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
