//! Tenure task worker runtime.

#![forbid(unsafe_code)]

mod worker_config;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tenure_application::{Lease, TaskCatalogSource, TaskLeaseStore, WorkerLifecycle};
use tenure_core::{AppError, AppResult};
use tenure_domain::new_holder_id;
use tenure_infrastructure::{
    FileTaskCatalogSource, FilesystemTaskLeaseStore, HttpTaskCatalogSource, HttpTaskExecutor,
    InMemoryTaskLeaseStore, RedisTaskLeaseStore,
};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::worker_config::{CatalogSourceConfig, LeaseBackendConfig, WorkerConfig};

const EXECUTOR_RETRY_BACKOFF_MS: u64 = 250;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode, AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let assignment = config.assignment()?;
    let holder_id = new_holder_id(config.worker_id.as_str());
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    let lease = Lease::new(
        build_lease_store(&config.lease_backend)?,
        assignment.key().lease_resource_key(),
        holder_id,
    );
    let executor = Arc::new(HttpTaskExecutor::new(
        http_client.clone(),
        config.executor_url.as_str(),
        config.executor_max_attempts,
        EXECUTOR_RETRY_BACKOFF_MS,
    ));
    let lifecycle = WorkerLifecycle::new(
        assignment,
        config.settings.clone(),
        lease,
        build_catalog_source(&config.catalog_source, http_client),
        executor,
    )?;

    info!(
        worker_id = %config.worker_id,
        task_key = %config.task_key,
        composite = config.composite,
        acquire_timeout_seconds = config.settings.acquire_timeout.as_secs(),
        expiration_tolerance_seconds = config.settings.expiration_tolerance.as_secs(),
        poll_interval_ms = u64::try_from(config.settings.poll_interval.as_millis())
            .unwrap_or(u64::MAX),
        abdication_policy = config.settings.abdication_policy.as_str(),
        death_time = %lifecycle.lifespan().death_time(),
        "tenure-worker started"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        if shutdown_tx.send(true).is_err() {
            warn!("worker stopped before the shutdown signal was delivered");
        }
    });

    let exit = lifecycle.run(shutdown_rx).await;
    info!(
        worker_id = %config.worker_id,
        reason = exit.reason.as_str(),
        clean = exit.is_clean(),
        "tenure-worker stopped"
    );

    Ok(if exit.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn build_lease_store(backend: &LeaseBackendConfig) -> AppResult<Arc<dyn TaskLeaseStore>> {
    let store: Arc<dyn TaskLeaseStore> = match backend {
        LeaseBackendConfig::Filesystem { path_prefix } => {
            Arc::new(FilesystemTaskLeaseStore::new(path_prefix.clone()))
        }
        LeaseBackendConfig::Redis { url, key_prefix } => {
            let client = redis::Client::open(url.as_str()).map_err(|error| {
                AppError::Validation(format!("invalid TENURE_REDIS_URL '{url}': {error}"))
            })?;
            Arc::new(RedisTaskLeaseStore::new(client, key_prefix.as_str()))
        }
        LeaseBackendConfig::Memory => {
            warn!("in-memory lease store only coordinates workers inside this process");
            Arc::new(InMemoryTaskLeaseStore::new())
        }
    };

    Ok(store)
}

fn build_catalog_source(
    source: &CatalogSourceConfig,
    http_client: reqwest::Client,
) -> Arc<dyn TaskCatalogSource> {
    match source {
        CatalogSourceConfig::Http { url } => {
            Arc::new(HttpTaskCatalogSource::new(http_client, url.as_str()))
        }
        CatalogSourceConfig::File { path } => Arc::new(FileTaskCatalogSource::new(path.clone())),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(error = %error, "failed to listen for ctrl_c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(error) => {
                warn!(error = %error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("shutdown signal received");
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
