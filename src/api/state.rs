use std::sync::Arc;

use super::auth::AuthPolicy;
use crate::config::{Config, NodeRole};
use crate::executor::JobExecutor;
use crate::observability::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub role: NodeRole,
    pub executor: Arc<JobExecutor>,
    pub auth: AuthPolicy,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        role: NodeRole,
        executor: Arc<JobExecutor>,
        auth: AuthPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            role,
            executor,
            auth,
            metrics,
        }
    }
}
