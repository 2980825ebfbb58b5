//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables to ensure
//! clean separation between code and config.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Object storage
    pub s3_bucket: String,
    pub aws_region: String,

    /// External image-generation provider
    pub provider_api_key: String,
    pub provider_base_url: String,

    /// Incoming billing webhook shared secret. Absent disables signature
    /// verification (logged as a warning, never a hard failure at startup).
    pub webhook_secret: Option<String>,

    /// How long a worker's claim on a job is valid before another worker
    /// may reclaim it.
    pub lease_duration: Duration,

    /// Maximum number of times a job may be reclaimed after a lease expiry
    /// before it is swept into a terminal failure.
    pub max_retries: i32,

    /// Credits charged per job, keyed by pricing tier (free/premium).
    pub credits_per_tier: HashMap<String, i32>,

    /// Credit grants applied by an incoming billing webhook, keyed by the
    /// billing processor's product identifier.
    pub credits_per_product: HashMap<String, i32>,

    /// TTL for presigned upload/download URLs.
    pub presign_ttl: Duration,

    /// Deadline a worker allows the provider call to take before treating
    /// it as a timeout. Defaults to half of `lease_duration`.
    pub provider_deadline: Duration,

    /// Interval between a worker's poll-for-work cycles.
    pub worker_poll_interval: Duration,

    /// Interval between sweeper passes over exhausted leases.
    pub sweep_interval: Duration,

    /// Number of poll-loop tasks a single worker process runs concurrently.
    /// Correctness is DB-mediated (`claim_next`'s `SKIP LOCKED`), so running
    /// N tasks in one process is equivalent to running N processes.
    pub worker_concurrency: u32,

    /// Runtime configuration
    pub log_level: String,
    pub rust_log: String,
    pub port: u16,
}

fn parse_credit_map(var: &str, default: &[(&str, i32)]) -> HashMap<String, i32> {
    match env::var(var) {
        Ok(raw) => raw
            .split(',')
            .filter_map(|pair| {
                let (k, v) = pair.split_once('=')?;
                Some((k.trim().to_string(), v.trim().parse().ok()?))
            })
            .collect(),
        Err(_) => default
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect(),
    }
}

fn env_duration_secs(var: &str, default_secs: u64) -> Duration {
    let secs = env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let lease_duration = env_duration_secs("LEASE_DURATION_SECS", 15 * 60);

        let webhook_secret = env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty());
        if webhook_secret.is_none() {
            tracing::warn!("WEBHOOK_SECRET not set; incoming webhook signatures will not be verified");
        }

        let config = Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL is required"))?,

            s3_bucket: env::var("S3_BUCKET")
                .map_err(|_| anyhow::anyhow!("S3_BUCKET is required"))?,
            aws_region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),

            provider_api_key: env::var("PROVIDER_API_KEY")
                .map_err(|_| anyhow::anyhow!("PROVIDER_API_KEY is required"))?,
            provider_base_url: env::var("PROVIDER_BASE_URL")
                .unwrap_or_else(|_| "https://api.provider.invalid".to_string()),

            webhook_secret,

            lease_duration,
            max_retries: env::var("MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),

            credits_per_tier: parse_credit_map(
                "CREDITS_PER_TIER",
                &[("free", 1), ("premium", 2)],
            ),
            credits_per_product: parse_credit_map("CREDITS_PER_PRODUCT", &[]),

            presign_ttl: env_duration_secs("PRESIGN_TTL_SECS", 3600),

            provider_deadline: env::var("PROVIDER_DEADLINE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(lease_duration / 2),

            worker_poll_interval: env_duration_secs("WORKER_POLL_INTERVAL_SECS", 5),
            sweep_interval: env_duration_secs("SWEEP_INTERVAL_SECS", 60),
            worker_concurrency: env::var("WORKER_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(1),

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "luster=debug".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
        };

        Ok(config)
    }
}
