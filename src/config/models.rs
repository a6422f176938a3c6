use crate::humanize::{ByteSize, HumanDuration};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Role a process plays in the cluster; picks which requirements apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Secret-guarded `/execute`, announces itself to the master
    ClusterWorker,
    /// Open endpoints including legacy `/video` and `/audio`, no registry
    Standalone,
    /// Registry and request router
    Master,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::ClusterWorker => "cluster",
            NodeRole::Standalone => "standalone",
            NodeRole::Master => "master",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for JSON request bodies
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: ByteSize,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    4001
}

fn default_max_request_bytes() -> ByteSize {
    ByteSize(16 * 1024)
}

/// Cluster coordination settings shared by workers and the master
#[derive(Clone, Deserialize, Serialize)]
pub struct ClusterConfig {
    /// Base URL of the master registry (workers only)
    pub registry_url: Option<String>,
    /// Externally reachable base URL of this worker
    pub public_url: Option<String>,
    /// Shared cluster secret (loaded from environment, not from config file)
    #[serde(skip)]
    pub secret: Option<String>,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: HumanDuration,
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout: HumanDuration,
    /// How long the master keeps a silent worker routable
    #[serde(default = "default_worker_ttl")]
    pub worker_ttl: HumanDuration,
}

impl fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("registry_url", &self.registry_url)
            .field("public_url", &self.public_url)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("heartbeat_timeout", &self.heartbeat_timeout)
            .field("worker_ttl", &self.worker_ttl)
            .finish()
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            registry_url: None,
            public_url: None,
            secret: None,
            heartbeat_interval: default_heartbeat_interval(),
            heartbeat_timeout: default_heartbeat_timeout(),
            worker_ttl: default_worker_ttl(),
        }
    }
}

fn default_heartbeat_interval() -> HumanDuration {
    HumanDuration::secs(20)
}

fn default_heartbeat_timeout() -> HumanDuration {
    HumanDuration::secs(5)
}

fn default_worker_ttl() -> HumanDuration {
    HumanDuration::secs(60)
}

/// External downloader (yt-dlp) settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloaderConfig {
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
    #[serde(default = "default_cookies_path")]
    pub cookies_path: PathBuf,
    /// Value for `--extractor-args youtube:player_client=...`
    #[serde(default = "default_player_client")]
    pub player_client: String,
    /// Ceiling for captured stdout/stderr of a video job
    #[serde(default = "default_video_output_limit")]
    pub video_output_limit: ByteSize,
    #[serde(default = "default_audio_output_limit")]
    pub audio_output_limit: ByteSize,
    /// Deadline for a single tool invocation
    #[serde(default = "default_timeout")]
    pub timeout: HumanDuration,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            cookies_path: default_cookies_path(),
            player_client: default_player_client(),
            video_output_limit: default_video_output_limit(),
            audio_output_limit: default_audio_output_limit(),
            timeout: default_timeout(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

fn default_binary() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_cookies_path() -> PathBuf {
    PathBuf::from("cookies.txt")
}

fn default_player_client() -> String {
    "android".to_string()
}

fn default_video_output_limit() -> ByteSize {
    ByteSize::mib(20)
}

fn default_audio_output_limit() -> ByteSize {
    ByteSize::mib(10)
}

fn default_timeout() -> HumanDuration {
    HumanDuration::mins(30)
}

fn default_max_concurrent_jobs() -> usize {
    2
}

/// Temp store and retention settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: HumanDuration,
    /// Entries older than this are reclaimed by the sweeper
    #[serde(default = "default_max_age")]
    pub max_age: HumanDuration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            sweep_interval: default_sweep_interval(),
            max_age: default_max_age(),
        }
    }
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_sweep_interval() -> HumanDuration {
    HumanDuration::mins(30)
}

fn default_max_age() -> HumanDuration {
    HumanDuration::mins(60)
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info,tower_http=info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind_addr().to_string(), "0.0.0.0:4001");
        assert_eq!(config.cluster.heartbeat_interval, HumanDuration::secs(20));
        assert_eq!(config.downloader.video_output_limit, ByteSize::mib(20));
        assert_eq!(config.downloader.audio_output_limit, ByteSize::mib(10));
        assert_eq!(config.storage.max_age, HumanDuration::mins(60));
        assert!(config.cluster.secret.is_none());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let mut cluster = ClusterConfig::default();
        cluster.secret = Some("hunter2".to_string());

        let rendered = format!("{:?}", cluster);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
