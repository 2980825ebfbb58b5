use std::sync::Arc;

use chrono::Utc;
use luster_common::Config;
use sqlx::PgPool;

use crate::repository::transactions::sweep_exhausted;

/// Run the exhaustion sweeper until `shutdown` resolves, ticking every
/// `sweep_interval` (spec section 4.5: "each worker (or a dedicated
/// sweeper) periodically scans for ... exhausted leases"). Grounded on
/// `original_source/services/worker/worker.py::cleanup_stuck_jobs`, but
/// run as its own task against the pool directly rather than sharing the
/// dispatcher's claim loop — a crashed worker's abandoned lease should be
/// swept even while every live peer is busy processing other jobs.
pub async fn run_sweeper(
    pool: PgPool,
    config: Arc<Config>,
    mut shutdown: tokio::sync::oneshot::Receiver<()>,
) {
    tracing::info!(interval_secs = config.sweep_interval.as_secs(), "sweeper started");
    let mut ticker = tokio::time::interval(config.sweep_interval);
    ticker.tick().await; // first tick fires immediately; skip it so we wait a full interval first

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("sweeper shutting down");
                break;
            }
            _ = ticker.tick() => {
                match sweep_exhausted(&pool, Utc::now()).await {
                    Ok(0) => {}
                    Ok(n) => tracing::info!(swept = n, "sweeper finalized exhausted jobs"),
                    Err(e) => tracing::error!(error = %e, "sweep pass failed"),
                }
            }
        }
    }
}
