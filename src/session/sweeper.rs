//! Inactivity sweeper
//!
//! Periodically expires sessions whose last activity is older than the
//! configured threshold. The sweep interval is independent of the threshold,
//! so a session may outlive the threshold by up to one interval.

use crate::session::registry::SessionRegistry;
use crate::utils::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Outcome of one sweep cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Active sessions in the snapshot
    pub scanned: usize,
    /// Sessions moved to EXPIRED
    pub expired: usize,
    /// Idle in the snapshot but refreshed or ended before the update
    pub skipped: usize,
    /// Sessions whose update failed
    pub failed: usize,
}

pub struct InactivitySweeper {
    registry: Arc<SessionRegistry>,
    threshold: chrono::Duration,
    interval: Duration,
}

impl InactivitySweeper {
    pub fn new(registry: Arc<SessionRegistry>, threshold: Duration, interval: Duration) -> Self {
        let threshold =
            chrono::Duration::from_std(threshold).unwrap_or_else(|_| chrono::Duration::days(36_500));
        Self {
            registry,
            threshold,
            interval,
        }
    }

    pub async fn run_cycle(&self) -> Result<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Runs one cycle as if the current time were `now`.
    ///
    /// A failure to list sessions aborts the cycle; a failure on a single
    /// session is logged and the rest are still processed.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let sessions = self.registry.active_sessions().await?;
        let cutoff = now - self.threshold;
        let mut report = SweepReport {
            scanned: sessions.len(),
            ..SweepReport::default()
        };

        for session in sessions
            .iter()
            .filter(|s| s.is_idle(now, self.threshold))
        {
            match self.registry.expire_idle(&session.identity, cutoff).await {
                Ok(Some(_)) => {
                    debug!(identity = %session.identity, username = %session.username, "Expired idle session");
                    report.expired += 1;
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    warn!(identity = %session.identity, error = %e, "Failed to expire idle session");
                    report.failed += 1;
                }
            }
        }

        if report.expired > 0 || report.failed > 0 {
            info!(
                scanned = report.scanned,
                expired = report.expired,
                skipped = report.skipped,
                failed = report.failed,
                "Inactivity sweep complete"
            );
        }
        Ok(report)
    }

    /// Starts the background sweep loop.
    ///
    /// Returns a JoinHandle for graceful shutdown coordination and a shutdown sender
    pub fn start(self) -> (JoinHandle<()>, mpsc::Sender<()>) {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.run_cycle().await {
                            error!("Inactivity sweep failed: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Sweeper received shutdown signal, stopping");
                        break;
                    }
                }
            }
        });

        (handle, shutdown_tx)
    }
}
