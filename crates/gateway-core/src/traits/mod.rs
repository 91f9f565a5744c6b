//! Collaborator traits consulted by the session and realtime layers.

pub mod audit;
pub mod cache;
pub mod directory;
pub mod observer;
pub mod policy;

pub use audit::AuditSink;
pub use cache::CacheProvider;
pub use directory::PrincipalDirectory;
pub use observer::SessionObserver;
pub use policy::{PolicyEngine, PolicyRule};
