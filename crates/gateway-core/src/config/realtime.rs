//! Real-time WebSocket engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Real-time (WebSocket) engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Per-client publisher buffer capacity. Excess publishes are dropped.
    #[serde(default = "default_publisher_capacity")]
    pub publisher_capacity: usize,
    /// Capacity of the writer's egress channel.
    #[serde(default = "default_egress_capacity")]
    pub egress_capacity: usize,
    /// Interval between heartbeat probes in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Seconds without any inbound frame before the connection is torn down.
    #[serde(default = "default_read_deadline")]
    pub read_deadline_seconds: u64,
    /// Delay between a kill notice and the forced disconnect, in seconds.
    #[serde(default = "default_kill_grace")]
    pub kill_grace_seconds: u64,
    /// Raise the open-file soft limit to the hard limit at startup.
    #[serde(default = "default_true")]
    pub raise_fd_limit: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            publisher_capacity: default_publisher_capacity(),
            egress_capacity: default_egress_capacity(),
            heartbeat_interval_seconds: default_heartbeat_interval(),
            read_deadline_seconds: default_read_deadline(),
            kill_grace_seconds: default_kill_grace(),
            raise_fd_limit: default_true(),
        }
    }
}

impl RealtimeConfig {
    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds.max(1))
    }

    /// Read deadline as a [`Duration`].
    pub fn read_deadline(&self) -> Duration {
        Duration::from_secs(self.read_deadline_seconds.max(1))
    }

    /// Kill grace period as a [`Duration`].
    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_seconds)
    }
}

fn default_publisher_capacity() -> usize {
    256
}

fn default_egress_capacity() -> usize {
    64
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_read_deadline() -> u64 {
    60
}

fn default_kill_grace() -> u64 {
    5
}

fn default_true() -> bool {
    true
}
