//! Job executor
//!
//! Turns a validated [`Job`] into a single artifact in the temp store by
//! running the external downloader. One executor serves every endpoint; the
//! caller owns the returned artifact and is responsible for deleting it.
//!
//! ## Flow
//!
//! 1. Wait for an admission permit (bounded concurrent processes)
//! 2. Reserve a unique artifact path
//! 3. Build the argument list and run the tool
//! 4. Succeed only on a zero exit *and* the file on disk; otherwise remove any
//!    partial output and report [`ExecuteError::DownloadFailed`]

pub mod format;
pub mod job;
pub mod process;

pub use format::{ToolSettings, build_args, video_format};
pub use job::{InvalidQuality, Job, MediaKind, Quality};
pub use process::ProcessTool;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::config::{ByteSize, DownloaderConfig};
use crate::storage::{Artifact, TempStore};

/// One run of the external tool
#[derive(Debug, Clone)]
pub struct Invocation {
    pub args: Vec<String>,
    /// Ceiling for each of stdout and stderr
    pub output_limit: ByteSize,
    /// Scratch directory for the child (TMPDIR and working dir)
    pub temp_dir: PathBuf,
}

/// What the tool reported after exiting
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    /// Captured stderr
    pub diagnostics: String,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to start downloader: {0}")]
    Spawn(#[source] std::io::Error),

    /// `diagnostics` holds the stderr captured before the kill
    #[error("downloader exceeded the {deadline:?} deadline")]
    Timeout {
        deadline: Duration,
        diagnostics: String,
    },

    #[error("downloader output exceeded {limit} bytes")]
    OutputOverflow { limit: usize, diagnostics: String },

    #[error("downloader i/o failed: {0}")]
    Io(#[source] std::io::Error),
}

impl ToolError {
    /// Partial stderr of a killed run
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Timeout { diagnostics, .. } | Self::OutputOverflow { diagnostics, .. } => {
                Some(diagnostics)
            }
            Self::Spawn(_) | Self::Io(_) => None,
        }
    }
}

/// Seam around the external downloader so the executor can be driven
/// without a real yt-dlp.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Engine name reported by health checks
    fn engine(&self) -> &str;

    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError>;
}

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("{kind} download failed: {reason}")]
    DownloadFailed {
        kind: MediaKind,
        reason: String,
        /// Raw stderr of the tool, when there was any
        diagnostics: Option<String>,
    },

    #[error("executor is shutting down")]
    Closed,
}

/// Executor limits taken from `[downloader]`
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub tool: ToolSettings,
    pub video_output_limit: ByteSize,
    pub audio_output_limit: ByteSize,
    pub max_concurrent_jobs: usize,
}

impl ExecutorSettings {
    /// `cookies` is only passed on when the file exists at startup
    pub fn from_config(config: &DownloaderConfig, cookies_present: bool) -> Self {
        Self {
            tool: ToolSettings {
                cookies: cookies_present.then(|| config.cookies_path.clone()),
                player_client: config.player_client.clone(),
            },
            video_output_limit: config.video_output_limit,
            audio_output_limit: config.audio_output_limit,
            max_concurrent_jobs: config.max_concurrent_jobs,
        }
    }

    fn output_limit(&self, kind: MediaKind) -> ByteSize {
        match kind {
            MediaKind::Video => self.video_output_limit,
            MediaKind::Audio => self.audio_output_limit,
        }
    }
}

pub struct JobExecutor {
    tool: Arc<dyn MediaTool>,
    store: TempStore,
    settings: ExecutorSettings,
    permits: Semaphore,
}

impl JobExecutor {
    pub fn new(tool: Arc<dyn MediaTool>, store: TempStore, settings: ExecutorSettings) -> Self {
        let permits = Semaphore::new(settings.max_concurrent_jobs.max(1));
        Self {
            tool,
            store,
            settings,
            permits,
        }
    }

    pub fn engine(&self) -> &str {
        self.tool.engine()
    }

    pub fn store(&self) -> &TempStore {
        &self.store
    }

    /// Whether jobs run with `--cookies`, decided once at startup
    pub fn uses_cookies(&self) -> bool {
        self.settings.tool.cookies.is_some()
    }

    /// Jobs that can start right now without waiting
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stop admitting new jobs; callers waiting on a slot get `Closed`
    pub fn close(&self) {
        self.permits.close();
    }

    /// Run a job to completion and hand back its artifact
    pub async fn execute(&self, job: &Job) -> Result<Artifact, ExecuteError> {
        let kind = job.kind();
        // Held only while the process runs, not while the caller streams
        let _permit = self.permits.acquire().await.map_err(|_| ExecuteError::Closed)?;

        let artifact = self.store.allocate(kind);
        let invocation = Invocation {
            args: build_args(job, &self.settings.tool, &artifact.path),
            output_limit: self.settings.output_limit(kind),
            temp_dir: self.store.root().to_path_buf(),
        };

        info!(%kind, url = job.url(), file = %artifact.file_name, "Running downloader");
        let outcome = self.tool.run(&invocation).await;
        let produced = self.store.exists(&artifact).await;

        let failure = match outcome {
            Ok(output) if output.success && produced => {
                info!(%kind, file = %artifact.file_name, "Download complete");
                return Ok(artifact);
            }
            Ok(output) => {
                let reason = if output.success {
                    "output file was not created".to_string()
                } else {
                    match output.exit_code {
                        Some(code) => format!("downloader exited with status {code}"),
                        None => "downloader was terminated by a signal".to_string(),
                    }
                };
                let diagnostics = Some(output.diagnostics).filter(|d| !d.trim().is_empty());
                (reason, diagnostics)
            }
            Err(e) => {
                let diagnostics = e
                    .diagnostics()
                    .filter(|d| !d.trim().is_empty())
                    .map(str::to_string);
                (e.to_string(), diagnostics)
            }
        };

        let (reason, diagnostics) = failure;
        error!(%kind, url = job.url(), %reason, stderr = diagnostics.as_deref().unwrap_or(""), "Download failed");

        // Partial output from a failed run is never handed out, including
        // the `.part` and per-format intermediates yt-dlp leaves next to it
        let discarded = self.store.remove_related(&artifact).await;
        if discarded > 0 {
            debug!(file = %artifact.file_name, discarded, "Discarded partial output");
        }

        Err(ExecuteError::DownloadFailed {
            kind,
            reason,
            diagnostics,
        })
    }
}
