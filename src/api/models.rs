//! Wire models for the worker and master HTTP endpoints.
//!
//! # Execute request
//!
//! ```json
//! { "type": "video", "url": "https://example.com/watch?v=1", "quality": "720" }
//! ```
//!
//! `quality` is `"max"` or a height bound and is ignored for `"audio"`.
//!
//! # Heartbeat
//!
//! ```json
//! { "url": "http://worker-1:4001", "secret": "..." }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::executor::MediaKind;
use crate::observability::MetricsSnapshot;

/// Body of `POST /execute` (worker) and `POST /download` (master)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecuteRequest {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

/// Query of the legacy `GET /video` and `GET /audio` endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyQuery {
    pub url: Option<String>,
    pub quality: Option<String>,
}

/// Body of `POST /cluster/ping`
#[derive(Clone, Deserialize, Serialize)]
pub struct Announcement {
    pub url: String,
    pub secret: String,
}

impl fmt::Debug for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Announcement")
            .field("url", &self.url)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Worker `GET /`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub engine: String,
    /// Whether the downloader's cookie file is present
    pub cookies: bool,
    pub port: u16,
    pub mode: String,
    pub version: String,
    pub available_slots: usize,
    pub jobs: MetricsSnapshotView,
}

/// Serializable mirror of the worker counters
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricsSnapshotView {
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub rejected: u64,
    pub heartbeats_sent: u64,
    pub heartbeats_failed: u64,
    pub swept: u64,
}

impl From<MetricsSnapshot> for MetricsSnapshotView {
    fn from(value: MetricsSnapshot) -> Self {
        Self {
            started: value.jobs_started,
            succeeded: value.jobs_succeeded,
            failed: value.jobs_failed,
            rejected: value.requests_rejected,
            heartbeats_sent: value.heartbeats_sent,
            heartbeats_failed: value.heartbeats_failed,
            swept: value.entries_swept,
        }
    }
}

/// One entry of `GET /cluster/workers`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerView {
    pub url: String,
    pub last_seen_secs: u64,
}

/// Master `GET /`
#[derive(Debug, Serialize, Deserialize)]
pub struct MasterHealthResponse {
    pub status: String,
    pub role: String,
    pub workers: usize,
    pub version: String,
}
