//! Heartbeat timing and the per-connection read deadline.
//!
//! The writer probes on a fixed interval when it has nothing else to send;
//! the reader renews the deadline on every inbound frame. A connection whose
//! deadline passes is torn down.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use gateway_core::config::realtime::RealtimeConfig;

/// Probe interval and read deadline for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatSettings {
    /// Time between probes.
    pub interval: Duration,
    /// Silence tolerated before the connection is considered dead.
    pub read_deadline: Duration,
}

impl HeartbeatSettings {
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self {
            interval: config.heartbeat_interval(),
            read_deadline: config.read_deadline(),
        }
    }
}

/// A renewable deadline shared by a client's reader and writer.
#[derive(Debug)]
pub(crate) struct ReadDeadline {
    window: Duration,
    at: Mutex<Instant>,
}

impl ReadDeadline {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            at: Mutex::new(Instant::now() + window),
        }
    }

    /// Push the deadline one full window past now.
    pub(crate) fn renew(&self) {
        let next = Instant::now() + self.window;
        match self.at.lock() {
            Ok(mut at) => *at = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    pub(crate) fn get(&self) -> Instant {
        match self.at.lock() {
            Ok(at) => *at,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub(crate) fn expired(&self) -> bool {
        Instant::now() >= self.get()
    }
}
