//! Transaction helpers for the Jobs domain.
//!
//! Free functions over an open `Transaction` so a caller (an API handler,
//! or another function in this module) can compose job writes with credit
//! writes inside one commit boundary (spec section 4.3: "the ordering
//! between reserve and create_job ... both happen in the same
//! transaction").

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::entities::{Asset, Job, JobEventRecord, JobEventType, JobStatus, Tier};
use luster_common::{Error, Result};
use luster_credits::{transactions as credit_tx, RefundOutcome, ReserveOutcome};

/// Create a job row within a transaction.
pub async fn create_job_tx(tx: &mut Transaction<'_, Postgres>, job: &Job) -> Result<Job> {
    let row = sqlx::query_as::<_, Job>(
        r#"
        INSERT INTO jobs (
            id, asset_id, user_id, prompt, tier, status, credits_used, output_key, error,
            started_at, completed_at, lease_expires_at, retry_count, max_retries,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING id, asset_id, user_id, prompt, tier, status, credits_used, output_key, error,
                  started_at, completed_at, lease_expires_at, retry_count, max_retries,
                  created_at, updated_at
        "#,
    )
    .bind(job.id)
    .bind(job.asset_id)
    .bind(job.user_id)
    .bind(&job.prompt)
    .bind(job.tier)
    .bind(job.status)
    .bind(job.credits_used)
    .bind(&job.output_key)
    .bind(&job.error)
    .bind(job.started_at)
    .bind(job.completed_at)
    .bind(job.lease_expires_at)
    .bind(job.retry_count)
    .bind(job.max_retries)
    .bind(job.created_at)
    .bind(job.updated_at)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

/// Get the next monotonic sequence number for a job's event stream.
pub async fn next_sequence_tx(tx: &mut Transaction<'_, Postgres>, job_id: Uuid) -> Result<i64> {
    let next: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(sequence), 0) + 1 FROM job_events WHERE job_id = $1",
    )
    .bind(job_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(next)
}

/// Append an event within a transaction.
pub async fn create_job_event_tx(
    tx: &mut Transaction<'_, Postgres>,
    job_id: Uuid,
    sequence: i64,
    event_type: JobEventType,
    payload: serde_json::Value,
) -> Result<JobEventRecord> {
    let row = sqlx::query_as::<_, JobEventRecord>(
        r#"
        INSERT INTO job_events (job_id, sequence, event_type, payload, created_at)
        VALUES ($1, $2, $3, $4, NOW())
        RETURNING id, job_id, sequence, event_type, payload, created_at
        "#,
    )
    .bind(job_id)
    .bind(sequence)
    .bind(event_type)
    .bind(sqlx::types::Json(payload))
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

/// Append an event, assigning its sequence number in the same statement
/// round-trip as the lookup (convenience wrapper over the two calls above).
async fn append_event_tx(
    tx: &mut Transaction<'_, Postgres>,
    job_id: Uuid,
    event_type: JobEventType,
    payload: serde_json::Value,
) -> Result<JobEventRecord> {
    let sequence = next_sequence_tx(tx, job_id).await?;
    create_job_event_tx(tx, job_id, sequence, event_type, payload).await
}

/// A freshly claimed job, plus whether this claim reclaimed an expired
/// lease rather than picking up a fresh `queued` row (spec section 4.5
/// step 2: the dispatcher treats a reclaim that exhausts the retry budget
/// differently from a fresh attempt).
pub struct Claimed {
    pub job: Job,
    pub is_reclaim: bool,
}

impl Claimed {
    /// True once this reclaim has spent the last retry the job is allowed
    /// (spec section 4.5 step 2): the dispatcher must finalize it as
    /// failed without ever invoking the provider for this claim.
    pub fn is_exhausted(&self) -> bool {
        self.is_reclaim && self.job.retry_count >= self.job.max_retries
    }
}

/// Atomically claim one queued or reclaimable job (spec section 4.3).
///
/// `SELECT ... FOR UPDATE SKIP LOCKED` is the concurrency primitive: other
/// callers racing this same statement skip any row already locked by a
/// concurrent claim rather than blocking on it, so "other callers skip the
/// locked row and continue" holds without an application-level mutex.
pub async fn claim_next_tx(
    tx: &mut Transaction<'_, Postgres>,
    now: DateTime<Utc>,
    lease_duration: chrono::Duration,
) -> Result<Option<Claimed>> {
    let candidate = sqlx::query_as::<_, Job>(
        r#"
        SELECT id, asset_id, user_id, prompt, tier, status, credits_used, output_key, error,
               started_at, completed_at, lease_expires_at, retry_count, max_retries,
               created_at, updated_at
        FROM jobs
        WHERE status = 'queued'
           OR (status = 'processing' AND lease_expires_at < $1 AND retry_count < max_retries)
        ORDER BY created_at ASC
        LIMIT 1
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(now)
    .fetch_optional(&mut **tx)
    .await?;

    let Some(job) = candidate else {
        return Ok(None);
    };

    let is_reclaim = job.status == JobStatus::Processing;
    let next_retry_count = if is_reclaim {
        job.retry_count + 1
    } else {
        job.retry_count
    };
    let lease_expires_at = now + lease_duration;
    let started_at = job.started_at.or(Some(now));

    let claimed = sqlx::query_as::<_, Job>(
        r#"
        UPDATE jobs
        SET status = 'processing', started_at = $2, lease_expires_at = $3,
            retry_count = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING id, asset_id, user_id, prompt, tier, status, credits_used, output_key, error,
                  started_at, completed_at, lease_expires_at, retry_count, max_retries,
                  created_at, updated_at
        "#,
    )
    .bind(job.id)
    .bind(started_at)
    .bind(lease_expires_at)
    .bind(next_retry_count)
    .fetch_one(&mut **tx)
    .await?;

    append_event_tx(
        tx,
        claimed.id,
        JobEventType::Started,
        serde_json::json!({ "is_retry": is_reclaim, "retry_count": next_retry_count }),
    )
    .await?;

    Ok(Some(Claimed { job: claimed, is_reclaim }))
}

/// Finalize a job as `succeeded`, clearing its lease (spec I5).
pub async fn complete_success_tx(
    tx: &mut Transaction<'_, Postgres>,
    job_id: Uuid,
    output_key: &str,
    now: DateTime<Utc>,
) -> Result<Job> {
    let job = sqlx::query_as::<_, Job>(
        r#"
        UPDATE jobs
        SET status = 'succeeded', output_key = $2, lease_expires_at = NULL,
            completed_at = $3, updated_at = NOW()
        WHERE id = $1 AND status = 'processing'
        RETURNING id, asset_id, user_id, prompt, tier, status, credits_used, output_key, error,
                  started_at, completed_at, lease_expires_at, retry_count, max_retries,
                  created_at, updated_at
        "#,
    )
    .bind(job_id)
    .bind(output_key)
    .bind(now)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| Error::Conflict(format!("Job {job_id} is not processing")))?;
    job.validate()?;

    append_event_tx(tx, job.id, JobEventType::Succeeded, serde_json::json!({})).await?;

    Ok(job)
}

/// Finalize a job as `failed`, refunding its reservation exactly once
/// (spec I2/I3) and clearing its lease (spec I5).
pub async fn complete_failure_tx(
    tx: &mut Transaction<'_, Postgres>,
    job_id: Uuid,
    error: &str,
    now: DateTime<Utc>,
) -> Result<Job> {
    let job = sqlx::query_as::<_, Job>(
        r#"
        UPDATE jobs
        SET status = 'failed', error = $2, lease_expires_at = NULL,
            completed_at = $3, updated_at = NOW()
        WHERE id = $1 AND status IN ('queued', 'processing')
        RETURNING id, asset_id, user_id, prompt, tier, status, credits_used, output_key, error,
                  started_at, completed_at, lease_expires_at, retry_count, max_retries,
                  created_at, updated_at
        "#,
    )
    .bind(job_id)
    .bind(error)
    .bind(now)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| Error::Conflict(format!("Job {job_id} is already terminal")))?;
    job.validate()?;

    append_event_tx(tx, job.id, JobEventType::Failed, serde_json::json!({ "error": error })).await?;

    if job.credits_used > 0 {
        let outcome = credit_tx::refund_tx(tx, job.user_id, job.credits_used, job.id).await?;
        if let RefundOutcome::Refunded { new_balance } = outcome {
            append_event_tx(
                tx,
                job.id,
                JobEventType::CreditsRefunded,
                serde_json::json!({ "credits_refunded": job.credits_used, "new_balance": new_balance }),
            )
            .await?;
        }
    }

    Ok(job)
}

/// Outcome of the user-facing `refund_job` endpoint (spec section 4.4):
/// always idempotent, distinguishing a genuine first refund from a replay.
pub enum RefundJobOutcome {
    Refunded { credits_refunded: i32, new_balance: i32 },
    AlreadyRefunded,
}

/// `refund_job` end to end (spec section 4.4: "callable only on failed
/// jobs; rejects if already refunded or if credits_used = 0"). In normal
/// operation the worker's own `complete_failure_tx` has already refunded
/// the job by the time a client calls this, so the common outcome here is
/// `AlreadyRefunded` — this function exists to make that idempotency
/// explicit and user-triggerable rather than purely automatic.
pub async fn refund_job_tx(
    tx: &mut Transaction<'_, Postgres>,
    job_id: Uuid,
    user_id: Uuid,
) -> Result<RefundJobOutcome> {
    // FOR UPDATE makes this function's idempotency structural rather than
    // incidental: without it, two concurrent calls (or a concurrent
    // worker `complete_failure_tx`) could both read `status = Failed`
    // before either has appended the `credits_refunded` marker. Locking
    // the row here serializes against `complete_failure_tx`'s own
    // status-guarded `UPDATE`, the same way that function already
    // serializes concurrent completers of one lease.
    let job = sqlx::query_as::<_, Job>(
        r#"
        SELECT id, asset_id, user_id, prompt, tier, status, credits_used, output_key, error,
               started_at, completed_at, lease_expires_at, retry_count, max_retries,
               created_at, updated_at
        FROM jobs
        WHERE id = $1 AND user_id = $2
        FOR UPDATE
        "#,
    )
    .bind(job_id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Job {job_id} not found")))?;

    if job.status != JobStatus::Failed {
        return Err(Error::FailedPrecondition(
            "refund_job is only callable on failed jobs".into(),
        ));
    }
    if job.credits_used == 0 {
        return Err(Error::FailedPrecondition(
            "job has no reserved credits to refund".into(),
        ));
    }

    let outcome = credit_tx::refund_tx(tx, job.user_id, job.credits_used, job.id).await?;
    match outcome {
        RefundOutcome::AlreadyRefunded => Err(Error::FailedPrecondition(
            "job credits have already been refunded".into(),
        )),
        RefundOutcome::Refunded { new_balance } => {
            append_event_tx(
                tx,
                job.id,
                JobEventType::CreditsRefunded,
                serde_json::json!({ "credits_refunded": job.credits_used, "new_balance": new_balance }),
            )
            .await?;
            Ok(RefundJobOutcome::Refunded {
                credits_refunded: job.credits_used,
                new_balance,
            })
        }
    }
}

/// Outcome of `create_job` (spec section 4.4): either the job was created
/// against a successful reservation, or the reservation itself failed and
/// nothing was written.
pub enum CreateJobOutcome {
    Created(Job),
    Insufficient { balance: i32 },
}

/// `create_job` end to end, in one transaction (spec section 4.4 steps
/// 1-5): reserve credits, insert the job, append `created`. The asset
/// ownership check (step 1) happens before this is called, since it needs
/// the caller's `user_id` to compare against, which this function doesn't
/// take — see the Intake API handler.
pub async fn create_job_with_reservation_tx(
    tx: &mut Transaction<'_, Postgres>,
    asset: &Asset,
    prompt: String,
    tier: Tier,
    credits_per_tier: &std::collections::HashMap<String, i32>,
    max_retries: i32,
) -> Result<CreateJobOutcome> {
    let cost = tier.cost(credits_per_tier);

    let reservation = credit_tx::reserve_tx(tx, asset.user_id, cost).await?;
    let balance = match reservation {
        ReserveOutcome::Insufficient { balance } => return Ok(CreateJobOutcome::Insufficient { balance }),
        ReserveOutcome::Reserved { new_balance } => new_balance,
    };
    tracing::debug!(user_id = %asset.user_id, cost, balance, "reserved credits for job");

    let job = Job::new(asset.id, asset.user_id, prompt, tier, cost, max_retries);
    let created = create_job_tx(tx, &job).await?;

    append_event_tx(
        tx,
        created.id,
        JobEventType::Created,
        serde_json::json!({ "credits_used": cost }),
    )
    .await?;

    Ok(CreateJobOutcome::Created(created))
}

/// Finalize every job whose lease expired past `max_retries` without a
/// worker ever returning (spec section 4.5: the sweeper's recovery path
/// for a worker that crashed between claim and complete). One transaction
/// per job so a failure on one doesn't roll back the rest.
///
/// Grounded on `original_source/services/worker/worker.py::cleanup_stuck_jobs`.
pub async fn sweep_exhausted(pool: &sqlx::PgPool, now: DateTime<Utc>) -> Result<i64> {
    let candidates: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id FROM jobs
        WHERE status = 'processing' AND lease_expires_at < $1 AND retry_count >= max_retries
        "#,
    )
    .bind(now)
    .fetch_all(pool)
    .await?;

    let mut swept = 0i64;
    for job_id in candidates {
        let mut tx = pool.begin().await?;
        match complete_failure_tx(&mut tx, job_id, "max_retries_exceeded", now).await {
            Ok(_) => {
                tx.commit().await?;
                swept += 1;
            }
            Err(Error::Conflict(_)) => {
                // Already finalized by a worker between the candidate scan and here.
                tx.rollback().await?;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(swept)
}

/// Result of cascading a shoot delete: row counts plus the object keys the
/// caller must best-effort delete from the store outside this transaction
/// (spec section 4.4: "errors during object deletion are logged and do
/// not abort the DB cascade").
pub struct ShootCascadeDelete {
    pub assets_deleted: i64,
    pub jobs_deleted: i64,
    pub object_keys: Vec<String>,
}

/// Delete a shoot and everything under it in one transaction. Returns
/// `None` if the shoot doesn't exist or isn't owned by `user_id`.
pub async fn delete_shoot_cascade_tx(
    tx: &mut Transaction<'_, Postgres>,
    shoot_id: Uuid,
    user_id: Uuid,
) -> Result<Option<ShootCascadeDelete>> {
    let owned: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM shoots WHERE id = $1 AND user_id = $2",
    )
    .bind(shoot_id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?;
    if owned.is_none() {
        return Ok(None);
    }

    let asset_ids: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM assets WHERE shoot_id = $1")
            .bind(shoot_id)
            .fetch_all(&mut **tx)
            .await?;

    let mut object_keys: Vec<String> = sqlx::query_scalar(
        "SELECT object_key FROM assets WHERE shoot_id = $1",
    )
    .bind(shoot_id)
    .fetch_all(&mut **tx)
    .await?;

    let output_keys: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT output_key FROM jobs
        WHERE asset_id = ANY($1) AND output_key IS NOT NULL
        "#,
    )
    .bind(&asset_ids)
    .fetch_all(&mut **tx)
    .await?;
    object_keys.extend(output_keys);

    sqlx::query(
        r#"
        DELETE FROM job_events WHERE job_id IN (SELECT id FROM jobs WHERE asset_id = ANY($1))
        "#,
    )
    .bind(&asset_ids)
    .execute(&mut **tx)
    .await?;

    let jobs_deleted = sqlx::query("DELETE FROM jobs WHERE asset_id = ANY($1)")
        .bind(&asset_ids)
        .execute(&mut **tx)
        .await?
        .rows_affected() as i64;

    let assets_deleted = sqlx::query("DELETE FROM assets WHERE shoot_id = $1")
        .bind(shoot_id)
        .execute(&mut **tx)
        .await?
        .rows_affected() as i64;

    sqlx::query("DELETE FROM shoots WHERE id = $1")
        .bind(shoot_id)
        .execute(&mut **tx)
        .await?;

    Ok(Some(ShootCascadeDelete { assets_deleted, jobs_deleted, object_keys }))
}
