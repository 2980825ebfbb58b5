use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use luster_common::{Config, Error, Result};
use luster_provider::{quality_params_for_tier, EnhanceRequest, ImageProvider, ProviderError};
use luster_storage::{keys, ObjectStore};
use uuid::Uuid;

use crate::domain::entities::{Asset, Job};
use crate::repository::transactions::{claim_next_tx, complete_failure_tx, complete_success_tx};
use crate::repository::JobsRepositories;

/// Internal retry budget for a single claim (spec section 5: "the external
/// provider call has a hard deadline ... a deadline breach is a retryable
/// failure"). Distinct from `retry_count`/`max_retries`, which span
/// separate `claim_next` calls across worker crashes.
const MAX_INTERNAL_ATTEMPTS: u32 = 3;
const INTERNAL_BACKOFF_BASE: StdDuration = StdDuration::from_millis(500);

/// One peer of the worker pool. Holds everything a claim needs to run to
/// completion: the repositories (for claim/complete/sweep), the object
/// store (input download, output upload, original cleanup), the
/// enhancement provider, and the shared configuration (lease duration,
/// provider deadline, tier pricing is not needed here — only
/// `credits_per_tier` feeds the Intake API's reservation, not the worker).
pub struct Dispatcher {
    repos: JobsRepositories,
    store: Arc<dyn ObjectStore>,
    provider: Arc<dyn ImageProvider>,
    config: Arc<Config>,
}

impl Dispatcher {
    pub fn new(
        repos: JobsRepositories,
        store: Arc<dyn ObjectStore>,
        provider: Arc<dyn ImageProvider>,
        config: Arc<Config>,
    ) -> Self {
        Self { repos, store, provider, config }
    }

    /// Run the poll loop until `shutdown` resolves. Each idle poll (no
    /// claimable job) sleeps `worker_poll_interval`; a successful claim
    /// loops back immediately to try for more work (spec section 5: the
    /// worker is one of N independent peers, not globally scheduled).
    pub async fn run(&self, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        tracing::info!("worker dispatcher started");
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("worker dispatcher shutting down");
                    break;
                }
                claimed = self.poll_once() => {
                    match claimed {
                        Ok(true) => continue,
                        Ok(false) => tokio::time::sleep(self.config.worker_poll_interval).await,
                        Err(e) => {
                            tracing::error!(error = %e, "error during poll cycle, backing off");
                            tokio::time::sleep(StdDuration::from_secs(10)).await;
                        }
                    }
                }
            }
        }
    }

    /// Claim at most one job and process it to a terminal state. Returns
    /// `true` if a job was claimed, so [`run`](Self::run) can skip its idle
    /// sleep and poll again immediately.
    pub async fn poll_once(&self) -> Result<bool> {
        let now = Utc::now();
        let lease_duration = chrono::Duration::from_std(self.config.lease_duration)
            .unwrap_or_else(|_| chrono::Duration::minutes(15));

        let mut tx = self.repos.pool().begin().await?;
        let claimed = match claim_next_tx(&mut tx, now, lease_duration).await? {
            Some(claimed) => claimed,
            None => {
                tx.rollback().await?;
                return Ok(false);
            }
        };
        tx.commit().await?;

        let job_id = claimed.job.id;
        if claimed.is_exhausted() {
            // spec section 4.5 step 2: this claim spent the job's last retry
            // reclaiming an expired lease. Finalize immediately without ever
            // invoking the provider for this claim (scenario 4: "on the
            // fourth poll ... the claim path ... finalizes failed").
            if let Err(e) = self.finalize_failure(&claimed.job, "max retries exceeded").await {
                tracing::error!(job_id = %job_id, error = %e, "failed to finalize exhausted job");
            } else {
                tracing::warn!(job_id = %job_id, "retry budget exhausted on reclaim, job failed");
            }
            return Ok(true);
        }

        if let Err(e) = self.process_claimed_job(claimed.job).await {
            tracing::error!(job_id = %job_id, error = %e, "unrecoverable error finalizing job");
        }
        Ok(true)
    }

    /// Run a single claimed job to completion: download the input, call
    /// the provider (with internal retry on transient errors), and
    /// finalize success or failure. Cleanup of scratch state (the original
    /// object) happens in both the success and failure path and never
    /// fails the job (spec section 7: "cleanup failures ... are logged and
    /// swallowed").
    async fn process_claimed_job(&self, job: Job) -> Result<()> {
        let span = tracing::info_span!("process_job", job_id = %job.id, retry_count = job.retry_count);
        let _enter = span.enter();

        let asset = match self.repos.assets.find_by_id(job.asset_id).await? {
            Some(asset) => asset,
            None => {
                self.finalize_failure(&job, "input asset no longer exists").await?;
                return Ok(());
            }
        };

        let input = match self.store.get(&asset.object_key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.finalize_failure(&job, &format!("failed to read input: {e}")).await?;
                return Ok(());
            }
        };

        match self.enhance_with_retry(&job, &asset, input).await {
            Ok(result) => {
                let output_key =
                    keys::output_key(job.user_id, asset.shoot_id, asset.id, job.id);
                let output =
                    super::metadata::strip_identifying_metadata(result.output, &result.content_type);
                if let Err(e) = self
                    .store
                    .put(&output_key, output, &result.content_type)
                    .await
                {
                    self.finalize_failure(&job, &format!("failed to store output: {e}")).await?;
                    return Ok(());
                }

                let mut tx = self.repos.pool().begin().await?;
                complete_success_tx(&mut tx, job.id, &output_key, Utc::now()).await?;
                tx.commit().await?;
                tracing::info!(job_id = %job.id, "job succeeded");

                self.delete_original_best_effort(job.id, &asset).await;
            }
            Err(message) => {
                self.finalize_failure(&job, &message).await?;
                self.delete_original_best_effort(job.id, &asset).await;
            }
        }

        Ok(())
    }

    /// Call the provider under its deadline, retrying transient failures
    /// up to [`MAX_INTERNAL_ATTEMPTS`] times with exponential backoff
    /// before giving up within this claim. A permanent provider error never
    /// retries.
    async fn enhance_with_retry(
        &self,
        job: &Job,
        asset: &Asset,
        input: bytes::Bytes,
    ) -> std::result::Result<luster_provider::EnhanceResult, String> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let request = EnhanceRequest {
                job_id: job.id,
                tier: job.tier.as_str().to_string(),
                prompt: job.prompt.clone(),
                quality_params: quality_params_for_tier(job.tier.as_str()),
                input: input.clone(),
                content_type: asset.content_type.clone(),
            };

            let outcome = tokio::time::timeout(
                self.config.provider_deadline,
                self.provider.enhance(request),
            )
            .await;

            let error = match outcome {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(ProviderError::Permanent(msg))) => {
                    return Err(format!("provider error: {msg}"));
                }
                Ok(Err(ProviderError::Configuration(msg))) => {
                    return Err(format!("provider misconfigured: {msg}"));
                }
                Ok(Err(ProviderError::Transient(msg))) => msg,
                Err(_) => "provider call exceeded deadline".to_string(),
            };

            if attempt >= MAX_INTERNAL_ATTEMPTS {
                return Err(format!(
                    "provider error after {attempt} attempts: {error}"
                ));
            }

            let backoff = INTERNAL_BACKOFF_BASE * 2u32.pow(attempt - 1);
            tracing::warn!(job_id = %job.id, attempt, error = %error, backoff_ms = backoff.as_millis() as u64, "transient provider error, retrying");
            tokio::time::sleep(backoff).await;
        }
    }

    async fn finalize_failure(&self, job: &Job, error: &str) -> Result<()> {
        let mut tx = self.repos.pool().begin().await?;
        match complete_failure_tx(&mut tx, job.id, error, Utc::now()).await {
            Ok(_) => {
                tx.commit().await?;
                tracing::warn!(job_id = %job.id, error, "job failed, credits refunded");
                Ok(())
            }
            Err(Error::Conflict(_)) => {
                // Already finalized by the sweeper racing this same lease.
                tx.rollback().await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Delete the original upload after a job reaches a terminal state,
    /// either way (spec.md's resolved Open Question: the core only ever
    /// keeps the output once a job has run, win or lose). Best-effort: a
    /// failure here is logged and never bubbles into job state.
    async fn delete_original_best_effort(&self, job_id: Uuid, asset: &Asset) {
        if let Err(e) = self.store.delete(&asset.object_key).await {
            tracing::warn!(job_id = %job_id, object_key = %asset.object_key, error = %e, "failed to delete original after job completion");
        }
    }
}
