//! Idle session eviction.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use gateway_core::config::session::SessionConfig;
use gateway_core::events::SessionEndReason;

use super::manager::SessionManager;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Idle, connectionless sessions found.
    pub scanned: usize,
    /// Sessions fully revoked.
    pub revoked: usize,
    /// Remember sessions dropped from the registry only.
    pub released: usize,
    /// Revocations that failed; retried on the next sweep.
    pub failed: usize,
}

/// Periodically evicts sessions that are idle and have no live connection.
#[derive(Debug, Clone)]
pub struct IdleSessionMonitor {
    manager: Arc<SessionManager>,
    interval: Duration,
    threshold: Duration,
}

impl IdleSessionMonitor {
    /// Create a monitor with explicit timings.
    pub fn new(manager: Arc<SessionManager>, interval: Duration, threshold: Duration) -> Self {
        Self {
            manager,
            interval: interval.max(Duration::from_millis(1)),
            threshold,
        }
    }

    /// Create a monitor from the session configuration.
    pub fn from_config(manager: Arc<SessionManager>, config: &SessionConfig) -> Self {
        Self::new(
            manager,
            Duration::from_secs(config.monitor_interval_seconds),
            Duration::from_secs(config.idle_threshold_seconds),
        )
    }

    /// Run a single sweep.
    ///
    /// Remember sessions are only released from the registry; every other
    /// candidate is revoked durably with reason `idle`.
    pub async fn run_once(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let Some(cutoff) = chrono::Duration::from_std(self.threshold)
            .ok()
            .and_then(|t| Utc::now().checked_sub_signed(t))
        else {
            return report;
        };

        let registry = self.manager.registry();
        let candidates = registry.idle_candidates(cutoff).await;
        report.scanned = candidates.len();

        for candidate in candidates {
            // A connection may have attached since the snapshot.
            let still_idle = registry
                .get_by_id(&candidate.session_id)
                .await
                .is_some_and(|r| !r.connected && r.last_activity <= cutoff);
            if !still_idle {
                continue;
            }

            if candidate.remember {
                self.manager.release(&candidate.session_id).await;
                debug!(session_id = %candidate.session_id, "Released idle remember session");
                report.released += 1;
                continue;
            }

            match self
                .manager
                .end_session(candidate.session_id, SessionEndReason::Idle)
                .await
            {
                Ok(_) => report.revoked += 1,
                Err(e) => {
                    error!(
                        session_id = %candidate.session_id,
                        error = %e,
                        "Failed to revoke idle session"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.scanned > 0 {
            info!(
                scanned = report.scanned,
                revoked = report.revoked,
                released = report.released,
                failed = report.failed,
                "Idle session sweep completed"
            );
        }
        report
    }

    /// Run sweeps on a fixed interval until `shutdown` flips to `true`.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                interval_secs = self.interval.as_secs(),
                threshold_secs = self.threshold.as_secs(),
                "Idle session monitor started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Idle session monitor stopped");
        })
    }
}
