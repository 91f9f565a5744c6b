//! Session limit resolution: the maximum concurrent sessions for a role.
//!
//! Resolution order:
//! 1. Per-role configuration (`session.limits.by_role`)
//! 2. Default (`session.limits.default_max`)

use gateway_core::config::session::{OverflowStrategy, SessionLimitsConfig};
use gateway_core::types::SessionLimit;

/// Resolves session limits and the overflow strategy from configuration.
#[derive(Debug, Clone)]
pub struct SessionLimiter {
    config: SessionLimitsConfig,
}

impl SessionLimiter {
    /// Creates a new session limiter.
    pub fn new(config: SessionLimitsConfig) -> Self {
        Self { config }
    }

    /// Resolves the effective maximum concurrent sessions for a role.
    pub fn resolve_limit(&self, role: &str) -> SessionLimit {
        self.config.limit_for(role)
    }

    /// What to do when a login would exceed the limit.
    pub fn overflow_strategy(&self) -> OverflowStrategy {
        self.config.overflow_strategy
    }
}
