//! Session management configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::session_limit::SessionLimit;

/// Session management configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds without activity before a connectionless session is evicted.
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_seconds: u64,
    /// Interval between idle sweeps in seconds.
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_seconds: u64,
    /// Concurrent session limits configuration.
    #[serde(default)]
    pub limits: SessionLimitsConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_threshold_seconds: default_idle_threshold(),
            monitor_interval_seconds: default_monitor_interval(),
            limits: SessionLimitsConfig::default(),
        }
    }
}

/// Concurrent session limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLimitsConfig {
    /// Overflow strategy when a principal exceeds their session limit.
    #[serde(default)]
    pub overflow_strategy: OverflowStrategy,
    /// Limit applied to roles missing from `by_role`. `0` means unlimited.
    #[serde(default = "default_max")]
    pub default_max: u32,
    /// Per-role session limits. Key is role name, value is max sessions.
    /// A value of `0` means unlimited.
    #[serde(default)]
    pub by_role: HashMap<String, u32>,
}

impl Default for SessionLimitsConfig {
    fn default() -> Self {
        Self {
            overflow_strategy: OverflowStrategy::default(),
            default_max: default_max(),
            by_role: HashMap::new(),
        }
    }
}

impl SessionLimitsConfig {
    /// Resolve the limit for a role.
    pub fn limit_for(&self, role: &str) -> SessionLimit {
        let max = self.by_role.get(role).copied().unwrap_or(self.default_max);
        SessionLimit::from_config(max)
    }
}

/// Strategy applied when a principal tries to exceed their session limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowStrategy {
    /// Deny the new login attempt.
    Deny,
    /// Terminate the oldest existing session to make room.
    #[default]
    KickOldest,
}

impl std::fmt::Display for OverflowStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverflowStrategy::Deny => write!(f, "deny"),
            OverflowStrategy::KickOldest => write!(f, "kick_oldest"),
        }
    }
}

fn default_idle_threshold() -> u64 {
    300
}

fn default_monitor_interval() -> u64 {
    60
}

fn default_max() -> u32 {
    3
}
