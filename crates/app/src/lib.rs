//! Luster application composition root.
//!
//! Composes the Jobs, Credits, and Webhooks domain routers into a single
//! application, wiring each domain's state from one shared `PgPool` and
//! `Config`.

use std::sync::Arc;

use axum::Router;
use sqlx::PgPool;

use luster_auth::{AuthBackend, AuthConfig};
use luster_common::Config;
use luster_credits::{CreditsLedger, CreditsState};
use luster_jobs::{JobsRepositories, JobsState};
use luster_storage::S3ObjectStore;
use luster_webhooks::WebhooksState;

/// Create the main application router with all domain routes.
pub async fn create_app(config: Config, pool: PgPool) -> Result<Router, anyhow::Error> {
    let config = Arc::new(config);

    let jobs_repos = JobsRepositories::new(pool.clone());
    let credits_ledger = CreditsLedger::new(pool.clone());

    let auth_config = AuthConfig {
        jwt_secret: std::env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
        issuer: std::env::var("JWT_ISSUER").ok(),
        audience: std::env::var("JWT_AUDIENCE").ok(),
    };
    let auth_backend = AuthBackend::new(pool.clone(), auth_config);

    let store: Arc<dyn luster_storage::ObjectStore> = Arc::new(
        S3ObjectStore::from_env(config.s3_bucket.clone(), config.aws_region.clone()).await,
    );

    let jobs_state = JobsState {
        repos: jobs_repos,
        auth: auth_backend.clone(),
        store,
        config: config.clone(),
    };

    let credits_state = CreditsState {
        ledger: credits_ledger.clone(),
        auth: auth_backend,
    };

    let webhooks_state = WebhooksState {
        ledger: credits_ledger,
        config: config.clone(),
    };

    let app = Router::new()
        .route("/health", axum::routing::get(health_check))
        .route("/", axum::routing::get(|| async { "Luster API v0.1.0" }))
        .merge(luster_jobs::routes().with_state(jobs_state))
        .merge(luster_credits::routes().with_state(credits_state))
        .merge(luster_webhooks::routes().with_state(webhooks_state));

    Ok(app)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
