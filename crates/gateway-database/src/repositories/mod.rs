//! Repository implementations.

pub mod audit;
pub mod principal;

pub use audit::SessionAuditRepository;
pub use principal::{PrincipalRecord, PrincipalRepository};
