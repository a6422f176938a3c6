use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::models::Announcement;
use crate::config::ClusterConfig;
use crate::observability::Metrics;

#[derive(Debug, Error)]
pub enum HeartbeatError {
    #[error("cluster.{0} is required for heartbeats")]
    MissingSetting(&'static str),
    #[error("failed to build heartbeat client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("registry unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("registry rejected heartbeat with status {0}")]
    Rejected(StatusCode),
}

/// Periodically announces this worker to the master registry.
///
/// The first announcement goes out as soon as `run` starts. Failures are
/// logged and the next tick simply tries again; there is no backoff.
pub struct Beacon {
    client: reqwest::Client,
    endpoint: String,
    announcement: Announcement,
    every: Duration,
    metrics: Arc<Metrics>,
}

impl Beacon {
    pub fn new(config: &ClusterConfig, metrics: Arc<Metrics>) -> Result<Self, HeartbeatError> {
        let registry = config
            .registry_url
            .as_deref()
            .ok_or(HeartbeatError::MissingSetting("registry_url"))?;
        let public_url = config
            .public_url
            .clone()
            .ok_or(HeartbeatError::MissingSetting("public_url"))?;
        let secret = config
            .secret
            .clone()
            .ok_or(HeartbeatError::MissingSetting("secret"))?;

        let client = reqwest::Client::builder()
            .timeout(config.heartbeat_timeout.as_duration())
            .build()
            .map_err(HeartbeatError::Client)?;

        Ok(Self {
            client,
            endpoint: format!("{}/cluster/ping", registry.trim_end_matches('/')),
            announcement: Announcement {
                url: public_url,
                secret,
            },
            every: config.heartbeat_interval.as_duration(),
            metrics,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send a single announcement
    pub async fn announce(&self) -> Result<(), HeartbeatError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.announcement)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(HeartbeatError::Rejected(status))
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            registry = %self.endpoint,
            url = %self.announcement.url,
            interval_secs = self.every.as_secs(),
            "Heartbeat started"
        );

        let mut ticker = tokio::time::interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Heartbeat stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.announce().await {
                        Ok(()) => {
                            self.metrics.heartbeat(true);
                            debug!(registry = %self.endpoint, "Heartbeat delivered");
                        }
                        Err(e) => {
                            self.metrics.heartbeat(false);
                            warn!(registry = %self.endpoint, error = %e, "Heartbeat failed");
                        }
                    }
                }
            }
        }
    }
}
