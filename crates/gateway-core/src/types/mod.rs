//! Core type definitions used across the gateway workspace.

pub mod id;
pub mod principal;
pub mod session;
pub mod session_limit;

pub use id::*;
pub use principal::{GrantType, Principal};
pub use session::{AuthScope, IssuedCredentials, SessionMetadata, SessionRecord};
pub use session_limit::SessionLimit;
