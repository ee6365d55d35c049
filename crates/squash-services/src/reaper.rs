use serde::Serialize;
use squash_core::{ArtifactEntry, ArtifactKind, Clock};
use squash_storage::{ArtifactStore, DeleteOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    pub scanned: usize,
    pub expired: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Deletes artifacts older than the TTL from both staging areas, whether or
/// not they were ever delivered.
pub struct Reaper {
    store: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    interval: Duration,
}

impl Reaper {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            ttl,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Start the background sweep loop.
    /// Returns a handle for graceful shutdown
    pub fn start(self: Arc<Self>) -> ReaperHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tracing::info!(
            ttl_secs = self.ttl.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Reaper started"
        );

        let handle = tokio::spawn(async move {
            let mut sweep_interval = interval(self.interval);
            sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => {
                        tracing::info!("Reaper stopped");
                        break;
                    }
                    _ = sweep_interval.tick() => {
                        self.sweep().await;
                    }
                }
            }
        });

        ReaperHandle { token, handle }
    }

    /// Run one sweep over both staging areas. Listing or deletion failures are
    /// logged and counted, never returned.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self) -> ReapReport {
        let now = self.clock.now();
        let mut report = ReapReport::default();

        for kind in ArtifactKind::ALL {
            let entries = match self.store.list(kind).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::error!(error = %e, kind = %kind, "Failed to list artifacts");
                    continue;
                }
            };

            for entry in entries {
                report.scanned += 1;
                if !self.is_expired(&entry, now) {
                    continue;
                }
                report.expired += 1;

                match self.store.remove_entry(kind, &entry.name).await {
                    Ok(DeleteOutcome::Deleted) => {
                        report.deleted += 1;
                        tracing::debug!(
                            kind = %kind,
                            artifact = %entry.name,
                            created_at = %entry.created_at,
                            "Expired artifact deleted"
                        );
                    }
                    Ok(DeleteOutcome::AlreadyAbsent) => {}
                    Err(e) => {
                        report.failed += 1;
                        tracing::error!(
                            error = %e,
                            kind = %kind,
                            artifact = %entry.name,
                            "Failed to delete expired artifact"
                        );
                    }
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            expired = report.expired,
            deleted = report.deleted,
            failed = report.failed,
            "Reaper sweep completed"
        );

        report
    }

    fn is_expired(&self, entry: &ArtifactEntry, now: chrono::DateTime<chrono::Utc>) -> bool {
        // A creation time in the future has a negative age and is kept.
        (now - entry.created_at)
            .to_std()
            .map(|age| age > self.ttl)
            .unwrap_or(false)
    }
}

/// Running reaper loop.
#[derive(Debug)]
pub struct ReaperHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stop the loop after any sweep in progress and wait for it to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Reaper task ended abnormally");
        }
    }
}
