//! Shared-secret authorization

use axum::http::HeaderMap;
use std::fmt;
use std::sync::Arc;

use super::error::ApiError;

/// Header carrying the cluster secret on inbound execute calls
pub const SECRET_HEADER: &str = "x-cluster-secret";

/// Process-wide credential shared by the master and its workers
#[derive(Clone)]
pub struct ClusterSecret(Arc<str>);

impl ClusterSecret {
    pub fn new(secret: impl AsRef<str>) -> Self {
        Self(Arc::from(secret.as_ref()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Exact comparison without an early exit on the first differing byte
    pub fn matches(&self, candidate: &str) -> bool {
        let expected = self.0.as_bytes();
        let candidate = candidate.as_bytes();
        if expected.len() != candidate.len() {
            return false;
        }

        expected
            .iter()
            .zip(candidate)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl fmt::Debug for ClusterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClusterSecret(<redacted>)")
    }
}

/// Who may call the execute endpoints
#[derive(Debug, Clone)]
pub enum AuthPolicy {
    /// Standalone mode, no credential required
    Open,
    /// Cluster mode, header must equal the secret
    SharedSecret(ClusterSecret),
}

impl AuthPolicy {
    /// Checked before any filesystem or process work
    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        match self {
            AuthPolicy::Open => Ok(()),
            AuthPolicy::SharedSecret(secret) => {
                let presented = headers
                    .get(SECRET_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .ok_or(ApiError::Unauthorized)?;

                if secret.matches(presented) {
                    Ok(())
                } else {
                    Err(ApiError::Unauthorized)
                }
            }
        }
    }
}
