use super::models::{Config, NodeRole};
use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} must be positive")]
    ZeroValue { field: &'static str },

    #[error("{field} is not a valid http(s) URL: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{role} node requires {field}")]
    MissingSetting { role: NodeRole, field: &'static str },

    #[error(
        "downloader.timeout ({timeout}) must be shorter than storage.max_age ({max_age}) \
         or the sweeper can reclaim files that are still being written"
    )]
    SweepOverlapsJobs { timeout: String, max_age: String },
}

/// Validate the role-independent parts of the configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_limits(config)?;
    validate_intervals(config)?;
    validate_urls(config)?;
    Ok(())
}

/// Validate settings a given role cannot run without
pub fn validate_role(config: &Config, role: NodeRole) -> Result<(), ValidationError> {
    let missing = |field| ValidationError::MissingSetting { role, field };

    match role {
        NodeRole::ClusterWorker => {
            if config.cluster.secret.is_none() {
                return Err(missing("CLUSTER_SECRET"));
            }
            if config.cluster.registry_url.is_none() {
                return Err(missing("cluster.registry_url"));
            }
            if config.cluster.public_url.is_none() {
                return Err(missing("cluster.public_url"));
            }
        }
        NodeRole::Master => {
            if config.cluster.secret.is_none() {
                return Err(missing("CLUSTER_SECRET"));
            }
        }
        NodeRole::Standalone => {}
    }

    Ok(())
}

fn validate_limits(config: &Config) -> Result<(), ValidationError> {
    let downloader = &config.downloader;

    if downloader.max_concurrent_jobs == 0 {
        return Err(ValidationError::ZeroValue {
            field: "downloader.max_concurrent_jobs",
        });
    }
    if downloader.video_output_limit.as_u64() == 0 {
        return Err(ValidationError::ZeroValue {
            field: "downloader.video_output_limit",
        });
    }
    if downloader.audio_output_limit.as_u64() == 0 {
        return Err(ValidationError::ZeroValue {
            field: "downloader.audio_output_limit",
        });
    }
    if config.server.max_request_bytes.as_u64() == 0 {
        return Err(ValidationError::ZeroValue {
            field: "server.max_request_bytes",
        });
    }

    Ok(())
}

fn validate_intervals(config: &Config) -> Result<(), ValidationError> {
    let durations = [
        ("cluster.heartbeat_interval", config.cluster.heartbeat_interval),
        ("cluster.heartbeat_timeout", config.cluster.heartbeat_timeout),
        ("cluster.worker_ttl", config.cluster.worker_ttl),
        ("downloader.timeout", config.downloader.timeout),
        ("storage.sweep_interval", config.storage.sweep_interval),
        ("storage.max_age", config.storage.max_age),
    ];

    for (field, value) in durations {
        if value.as_duration().is_zero() {
            return Err(ValidationError::ZeroValue { field });
        }
    }

    if config.downloader.timeout >= config.storage.max_age {
        return Err(ValidationError::SweepOverlapsJobs {
            timeout: config.downloader.timeout.to_string(),
            max_age: config.storage.max_age.to_string(),
        });
    }

    Ok(())
}

fn validate_urls(config: &Config) -> Result<(), ValidationError> {
    let urls = [
        ("cluster.registry_url", config.cluster.registry_url.as_deref()),
        ("cluster.public_url", config.cluster.public_url.as_deref()),
    ];

    for (field, value) in urls {
        if let Some(value) = value {
            if !is_http_url(value) {
                return Err(ValidationError::InvalidUrl {
                    field,
                    value: value.to_string(),
                });
            }
        }
    }

    Ok(())
}

/// True for absolute `http`/`https` URLs with a host
pub fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::HumanDuration;

    fn cluster_worker_config() -> Config {
        let mut config = Config::default();
        config.cluster.secret = Some("secret".to_string());
        config.cluster.registry_url = Some("http://master:4000".to_string());
        config.cluster.public_url = Some("http://worker-1:4001".to_string());
        config
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
        assert!(validate_role(&Config::default(), NodeRole::Standalone).is_ok());
    }

    #[test]
    fn test_cluster_worker_requires_secret() {
        let mut config = cluster_worker_config();
        assert!(validate_role(&config, NodeRole::ClusterWorker).is_ok());

        config.cluster.secret = None;
        let result = validate_role(&config, NodeRole::ClusterWorker);
        assert!(matches!(
            result,
            Err(ValidationError::MissingSetting { field: "CLUSTER_SECRET", .. })
        ));
    }

    #[test]
    fn test_cluster_worker_requires_urls() {
        let mut config = cluster_worker_config();
        config.cluster.public_url = None;

        let result = validate_role(&config, NodeRole::ClusterWorker);
        assert!(matches!(
            result,
            Err(ValidationError::MissingSetting { field: "cluster.public_url", .. })
        ));
    }

    #[test]
    fn test_master_only_needs_secret() {
        let mut config = Config::default();
        assert!(validate_role(&config, NodeRole::Master).is_err());

        config.cluster.secret = Some("secret".to_string());
        assert!(validate_role(&config, NodeRole::Master).is_ok());
    }

    #[test]
    fn test_rejects_non_http_registry() {
        let mut config = cluster_worker_config();
        config.cluster.registry_url = Some("ftp://master".to_string());

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::InvalidUrl { .. })));
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.downloader.max_concurrent_jobs = 0;

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::ZeroValue { .. })));
    }

    #[test]
    fn test_job_deadline_must_fit_inside_retention() {
        let mut config = Config::default();
        config.downloader.timeout = HumanDuration::mins(90);

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::SweepOverlapsJobs { .. })));
    }

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("https://example.com/watch?v=1"));
        assert!(is_http_url("http://10.0.0.2:4001"));
        assert!(!is_http_url("file:///etc/passwd"));
        assert!(!is_http_url("--exec rm"));
        assert!(!is_http_url(""));
    }
}
