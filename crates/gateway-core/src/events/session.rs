//! Session-related domain events.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{PrincipalId, SessionId};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    /// The principal logged out.
    Logout,
    /// Evicted by the idle monitor.
    Idle,
    /// Evicted to admit a newer session over the concurrency limit.
    LimitExceeded,
    /// Terminated by an operator.
    Terminated,
}

impl SessionEndReason {
    /// Stable string form used in audit rows and kill notices.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logout => "logout",
            Self::Idle => "idle",
            Self::LimitExceeded => "limit_exceeded",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for SessionEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events related to sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A principal logged in and a session was created.
    Created {
        /// The session ID.
        session_id: SessionId,
        /// The principal ID.
        principal_id: PrincipalId,
    },
    /// The session's credentials were refreshed.
    Refreshed {
        /// The session ID.
        session_id: SessionId,
    },
    /// The session ended.
    Ended {
        /// The session ID.
        session_id: SessionId,
        /// The principal ID.
        principal_id: PrincipalId,
        /// Why the session ended.
        reason: SessionEndReason,
    },
}
