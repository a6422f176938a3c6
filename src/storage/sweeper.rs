//! Retention sweeper for the temp store
//!
//! Reclaims artifacts whose owning request never cleaned up, such as sends
//! interrupted by a crash or jobs whose process was killed.
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::TempStore;
use crate::observability::Metrics;

/// Per-sweep statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepStats {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Delete every entry last modified more than `max_age` before `now`.
///
/// Deletion failures are counted and logged, never returned.
pub async fn sweep(store: &TempStore, max_age: Duration, now: SystemTime) -> SweepStats {
    let mut stats = SweepStats::default();

    let entries = match store.entries().await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "Sweep skipped, temp store unreadable");
            return stats;
        }
    };

    for entry in entries {
        stats.scanned += 1;

        // Clock skew or a future mtime counts as fresh
        let age = now.duration_since(entry.modified).unwrap_or_default();
        if age <= max_age {
            continue;
        }

        match store.remove(&entry.path).await {
            Ok(true) => {
                stats.removed += 1;
                debug!(path = %entry.path.display(), age_secs = age.as_secs(), size = entry.size, "Reclaimed stale artifact");
            }
            // Someone else got there first
            Ok(false) => {}
            Err(e) => {
                stats.failed += 1;
                debug!(path = %entry.path.display(), error = %e, "Failed to reclaim artifact");
            }
        }
    }

    stats
}

/// Recurring background task around [`sweep`]
pub struct Sweeper {
    store: TempStore,
    every: Duration,
    max_age: Duration,
    metrics: Arc<Metrics>,
}

impl Sweeper {
    pub fn new(store: TempStore, every: Duration, max_age: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            every,
            max_age,
            metrics,
        }
    }

    /// Sweep once at start, then every `every` until cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            every_secs = self.every.as_secs(),
            max_age_secs = self.max_age.as_secs(),
            "Retention sweeper started"
        );

        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let stats = sweep(&self.store, self.max_age, SystemTime::now()).await;
                    self.metrics.entries_swept(stats.removed as u64);
                    if stats.removed > 0 || stats.failed > 0 {
                        info!(?stats, "Sweep complete");
                    } else {
                        debug!(?stats, "Sweep complete");
                    }
                }
            }
        }

        info!("Retention sweeper stopped");
    }
}
