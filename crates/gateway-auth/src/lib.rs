//! # gateway-auth
//!
//! Authenticated session and credential lifecycle for the commerce gateway.
//!
//! ## Modules
//!
//! - `credential`: opaque bearer credential generation and digests
//! - `password`: Argon2id password verification
//! - `directory`: principal lookup backed by the `principals` table
//! - `audit`: tracing-backed audit sink
//! - `session`: durable store, in-memory registry, concurrency limits,
//!   the session manager and the idle monitor

pub mod audit;
pub mod credential;
pub mod directory;
pub mod password;
pub mod session;

pub use audit::TracingAuditSink;
pub use directory::DatabasePrincipalDirectory;
pub use password::PasswordHasher;
pub use session::{
    ActiveSessionRegistry, IdleSessionMonitor, LoginOutcome, LoginRequest, SessionLimiter,
    SessionManager, SessionStore, SessionValidator, SweepReport,
};
