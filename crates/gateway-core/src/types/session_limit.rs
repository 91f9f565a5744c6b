//! Session limit resolution types.

use serde::{Deserialize, Serialize};

/// Resolved concurrent-session limit for a principal.
///
/// Limits are resolved in priority order:
/// 1. Per-role configuration (`session.limits.by_role`)
/// 2. Default (`session.limits.default_max`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionLimit {
    /// A fixed maximum number of concurrent sessions.
    Fixed(u32),
    /// No per-principal limit.
    Unlimited,
}

impl SessionLimit {
    /// Convert a configured value. `0` means unlimited.
    pub fn from_config(value: u32) -> Self {
        Self::from(value)
    }

    /// Check whether admitting one more session on top of `active_count`
    /// would go over this limit.
    pub fn is_exceeded_by(&self, active_count: u32) -> bool {
        match self {
            Self::Fixed(max) => active_count >= *max,
            Self::Unlimited => false,
        }
    }

    /// Number of existing sessions that must end before one more fits.
    pub fn overflow(&self, active_count: u32) -> u32 {
        match self {
            Self::Fixed(max) if active_count >= *max => active_count - max + 1,
            _ => 0,
        }
    }

    /// Return the numeric limit, or `None` for unlimited.
    pub fn as_max(&self) -> Option<u32> {
        match self {
            Self::Fixed(max) => Some(*max),
            Self::Unlimited => None,
        }
    }
}

impl From<u32> for SessionLimit {
    fn from(value: u32) -> Self {
        if value == 0 {
            Self::Unlimited
        } else {
            Self::Fixed(value)
        }
    }
}
