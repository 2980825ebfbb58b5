//! Dispatcher/Worker Pool entry point.
//!
//! A thin binary: load configuration, wire up the repositories, object
//! store, and enhancement provider, then hand them to
//! `luster_jobs::worker::Dispatcher` and `luster_jobs::worker::run_sweeper`
//! as two concurrent tasks sharing one `PgPool`. Mirrors
//! `crates/app/src/bin/local.rs`'s tracing/graceful-shutdown shape.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::signal;
use tracing::{error, info};

use luster_common::Config;
use luster_jobs::{run_sweeper, Dispatcher, JobsRepositories};
use luster_provider::{ImageProviderFactory, ProviderConfig};
use luster_storage::{ObjectStore, S3ObjectStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .pretty()
        .init();

    info!("Starting Luster worker");

    let config = Arc::new(Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?);

    let pool = PgPool::connect(&config.database_url).await.map_err(|e| {
        error!("Failed to connect to database: {}", e);
        anyhow::anyhow!("Database connection failed: {}", e)
    })?;
    info!("Database connection established");

    let repos = JobsRepositories::new(pool.clone());

    let store: Arc<dyn ObjectStore> =
        Arc::new(S3ObjectStore::from_env(config.s3_bucket.clone(), config.aws_region.clone()).await);

    let provider_config = ProviderConfig::from_env()
        .map_err(|e| anyhow::anyhow!("provider configuration error: {e}"))?;
    let provider = Arc::from(
        ImageProviderFactory::create(provider_config)
            .map_err(|e| anyhow::anyhow!("failed to create image provider: {e}"))?,
    );

    let dispatcher = Arc::new(Dispatcher::new(repos, store, provider, config.clone()));

    // Correctness is DB-mediated (claim_next's SKIP LOCKED), so N poll-loop
    // tasks in this one process behave exactly like N separate worker
    // processes (spec section 5: "supports --concurrency N ... in addition
    // to running N separate processes").
    let concurrency = config.worker_concurrency.max(1);
    info!(concurrency, "starting dispatcher poll loops");

    let (sweeper_shutdown_tx, sweeper_shutdown_rx) = tokio::sync::oneshot::channel();
    let sweeper_pool = pool.clone();
    let sweeper_config = config.clone();
    let sweeper_handle = tokio::spawn(async move {
        run_sweeper(sweeper_pool, sweeper_config, sweeper_shutdown_rx).await;
    });

    let mut dispatcher_shutdown_txs = Vec::with_capacity(concurrency as usize);
    let mut dispatcher_handles = Vec::with_capacity(concurrency as usize);
    for _ in 0..concurrency {
        let (tx, rx) = tokio::sync::oneshot::channel();
        dispatcher_shutdown_txs.push(tx);
        let dispatcher = dispatcher.clone();
        dispatcher_handles.push(tokio::spawn(async move {
            dispatcher.run(rx).await;
        }));
    }

    shutdown_signal().await;
    info!("shutdown signal received, stopping worker tasks");

    let _ = sweeper_shutdown_tx.send(());
    for tx in dispatcher_shutdown_txs {
        let _ = tx.send(());
    }

    let _ = sweeper_handle.await;
    for handle in dispatcher_handles {
        let _ = handle.await;
    }

    info!("worker shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
