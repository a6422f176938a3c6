use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info};

/// In-memory table of workers that have announced themselves.
///
/// Entries older than `ttl` are pruned lazily whenever the table is read.
/// Selection is round-robin over the live set, ordered by URL.
pub struct WorkerRegistry {
    workers: RwLock<HashMap<String, Instant>>,
    ttl: Duration,
    next_worker: AtomicUsize,
}

impl WorkerRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            workers: RwLock::new(HashMap::new()),
            ttl,
            next_worker: AtomicUsize::new(0),
        }
    }

    /// Record or refresh a worker announcement
    pub async fn record(&self, url: &str) {
        let url = url.trim_end_matches('/').to_string();
        let mut workers = self.workers.write().await;
        if workers.insert(url.clone(), Instant::now()).is_none() {
            info!(worker = %url, "Worker joined");
        } else {
            debug!(worker = %url, "Worker refreshed");
        }
    }

    /// Live workers and how long ago each was last heard from
    pub async fn live_workers(&self) -> Vec<(String, Duration)> {
        self.live_as_of(Instant::now()).await
    }

    /// Next worker in round-robin order, `None` when nobody is live
    pub async fn pick(&self) -> Option<String> {
        let live = self.live_workers().await;
        if live.is_empty() {
            return None;
        }
        let idx = self.next_worker.fetch_add(1, Ordering::Relaxed) % live.len();
        live.into_iter().nth(idx).map(|(url, _)| url)
    }

    async fn live_as_of(&self, now: Instant) -> Vec<(String, Duration)> {
        let mut workers = self.workers.write().await;
        let ttl = self.ttl;
        workers.retain(|url, seen| {
            let fresh = now.saturating_duration_since(*seen) <= ttl;
            if !fresh {
                info!(worker = %url, "Worker expired");
            }
            fresh
        });

        let mut live: Vec<_> = workers
            .iter()
            .map(|(url, seen)| (url.clone(), now.saturating_duration_since(*seen)))
            .collect();
        live.sort_by(|a, b| a.0.cmp(&b.0));
        live
    }
}
