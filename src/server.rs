use std::sync::Arc;

use mediafetch::api::{self, AuthPolicy, ClusterSecret, state::AppState};
use mediafetch::cluster::{Beacon, MasterState, WorkerRegistry, master_router};
use mediafetch::config::{Config, NodeRole};
use mediafetch::executor::{ExecutorSettings, JobExecutor, ProcessTool};
use mediafetch::observability::Metrics;
use mediafetch::storage::{TempStore, sweeper::Sweeper};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn run(config: Config, role: NodeRole) -> Result<(), AnyError> {
    match role {
        NodeRole::Master => run_master(config).await,
        NodeRole::ClusterWorker | NodeRole::Standalone => run_worker(config, role).await,
    }
}

async fn run_worker(mut config: Config, role: NodeRole) -> Result<(), AnyError> {
    let metrics = Arc::new(Metrics::new());
    let store = TempStore::open(&config.storage.temp_dir).await?;

    // The downloader runs inside the temp dir, so relative paths must be resolved here
    let cookies_present = match tokio::fs::canonicalize(&config.downloader.cookies_path).await {
        Ok(path) => {
            config.downloader.cookies_path = path;
            true
        }
        Err(_) => {
            warn!(
                path = %config.downloader.cookies_path.display(),
                "Cookie file not found, downloads will run without cookies"
            );
            false
        }
    };

    let tool = Arc::new(ProcessTool::new(
        config.downloader.binary.clone(),
        config.downloader.timeout.as_duration(),
    ));
    let executor = Arc::new(JobExecutor::new(
        tool,
        store.clone(),
        ExecutorSettings::from_config(&config.downloader, cookies_present),
    ));

    let auth = match role {
        NodeRole::ClusterWorker => {
            let secret = config
                .cluster
                .secret
                .as_deref()
                .ok_or("CLUSTER_SECRET is required in cluster mode")?;
            AuthPolicy::SharedSecret(ClusterSecret::new(secret))
        }
        _ => AuthPolicy::Open,
    };

    let shutdown = CancellationToken::new();
    let mut tasks = JoinSet::new();

    let sweeper = Sweeper::new(
        store,
        config.storage.sweep_interval.as_duration(),
        config.storage.max_age.as_duration(),
        metrics.clone(),
    );
    tasks.spawn(sweeper.run(shutdown.clone()));

    if role == NodeRole::ClusterWorker {
        let beacon = Beacon::new(&config.cluster, metrics.clone())?;
        tasks.spawn(beacon.run(shutdown.clone()));
    }

    let address = config.server.bind_addr();
    let app = api::router(AppState::new(config, role, executor.clone(), auth, metrics));

    let listener = TcpListener::bind(address).await?;
    info!(%address, mode = %role, engine = executor.engine(), "mediafetch worker listening");

    let gate = executor.clone();
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Queued requests fail fast; running jobs finish
            gate.close();
        })
        .await?;

    stop_background(shutdown, tasks).await;
    info!("mediafetch worker stopped");
    Ok(())
}

async fn run_master(config: Config) -> Result<(), AnyError> {
    let secret = config
        .cluster
        .secret
        .as_deref()
        .ok_or("CLUSTER_SECRET is required in master mode")?;

    let registry = Arc::new(WorkerRegistry::new(config.cluster.worker_ttl.as_duration()));
    let state = MasterState::new(
        registry,
        ClusterSecret::new(secret),
        config.cluster.heartbeat_timeout.as_duration(),
        config.server.max_request_bytes.as_usize(),
    )?;

    let address = config.server.bind_addr();
    let listener = TcpListener::bind(address).await?;
    info!(%address, ttl_secs = config.cluster.worker_ttl.as_duration().as_secs(), "mediafetch master listening");

    axum::serve(listener, master_router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("mediafetch master stopped");
    Ok(())
}

async fn stop_background(shutdown: CancellationToken, mut tasks: JoinSet<()>) {
    shutdown.cancel();
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            warn!(error = %e, "Background task ended abnormally");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
