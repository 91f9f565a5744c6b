//! Session lifecycle: durable store, in-memory registry, limits, manager and
//! idle eviction.

pub mod limiter;
pub mod manager;
pub mod monitor;
pub mod registry;
pub mod store;
pub mod validator;

pub use limiter::SessionLimiter;
pub use manager::{LoginOutcome, LoginRequest, SessionManager};
pub use monitor::{IdleSessionMonitor, SweepReport};
pub use registry::ActiveSessionRegistry;
pub use store::SessionStore;
pub use validator::SessionValidator;
