//! Job lifecycle API handlers (spec section 4.4: `create_job`, `get_job`,
//! `refund_job`, plus the supplemented `list_jobs` and `get_job_events`).

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::sse::{Event, Sse},
    Json,
};
use chrono::{DateTime, Utc};
use luster_auth::VerifiedCaller;
use luster_common::{Error, Result, ValidatedJson};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::middleware::JobsState;
use crate::domain::entities::{Job, JobStatus, Tier};
use crate::repository::transactions::{
    create_job_with_reservation_tx, refund_job_tx, CreateJobOutcome, RefundJobOutcome,
};

#[derive(Debug, Serialize)]
pub struct JobCreatedResponse {
    pub id: Uuid,
    pub status: JobStatus,
    pub credits_used: i32,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub prompt: String,
    pub tier: Tier,
    pub status: JobStatus,
    pub credits_used: i32,
    pub output_url: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobResponse {
    fn from_job(job: Job, output_url: Option<String>) -> Self {
        Self {
            id: job.id,
            asset_id: job.asset_id,
            prompt: job.prompt,
            tier: job.tier,
            status: job.status,
            credits_used: job.credits_used,
            output_url,
            error: job.error,
            started_at: job.started_at,
            completed_at: job.completed_at,
            retry_count: job.retry_count,
            max_retries: job.max_retries,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateJobRequest {
    pub asset_id: Uuid,
    #[validate(length(min = 1, max = 2000))]
    pub prompt: String,
    pub tier: Tier,
}

/// `POST /jobs` — reserve + insert + event, all in one transaction (spec
/// section 4.4 steps 1-5).
pub async fn create_job(
    VerifiedCaller(ctx): VerifiedCaller,
    State(state): State<JobsState>,
    ValidatedJson(req): ValidatedJson<CreateJobRequest>,
) -> Result<Json<JobCreatedResponse>> {
    let asset = state
        .repos
        .assets
        .find(req.asset_id, ctx.user_id)
        .await?
        .ok_or_else(|| Error::NotFound("Asset not found".to_string()))?;

    let mut tx = state.repos.begin().await?;
    let outcome = create_job_with_reservation_tx(
        &mut tx,
        &asset,
        req.prompt,
        req.tier,
        &state.config.credits_per_tier,
        state.config.max_retries,
    )
    .await?;

    let job = match outcome {
        CreateJobOutcome::Created(job) => job,
        CreateJobOutcome::Insufficient { balance } => {
            return Err(Error::PaymentRequired(format!(
                "insufficient credits: balance is {balance}"
            )));
        }
    };
    tx.commit().await?;

    Ok(Json(JobCreatedResponse {
        id: job.id,
        status: job.status,
        credits_used: job.credits_used,
    }))
}

/// `GET /jobs/{id}` — job state with a freshly minted `output_url` when
/// the job has produced output.
pub async fn get_job(
    VerifiedCaller(ctx): VerifiedCaller,
    State(state): State<JobsState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>> {
    let job = state
        .repos
        .jobs
        .find(id, ctx.user_id)
        .await?
        .ok_or_else(|| Error::NotFound("Job not found".to_string()))?;

    let output_url = match &job.output_key {
        Some(key) => {
            let download = state
                .store
                .presign_download(key, state.config.presign_ttl, None)
                .await?;
            Some(download.url)
        }
        None => None,
    };

    Ok(Json(JobResponse::from_job(job, output_url)))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    pub status: Option<JobStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /jobs` (supplemented discovery path, see DESIGN.md). Does not mint
/// output URLs for every row to avoid N presign round-trips on a list
/// endpoint; callers fetch `GET /jobs/{id}` for the signed link.
pub async fn list_jobs(
    VerifiedCaller(ctx): VerifiedCaller,
    State(state): State<JobsState>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<Vec<JobResponse>>> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let offset = params.offset.unwrap_or(0).max(0);
    let jobs = state
        .repos
        .jobs
        .list_by_user(ctx.user_id, params.status, limit, offset)
        .await?;
    Ok(Json(jobs.into_iter().map(|j| JobResponse::from_job(j, None)).collect()))
}

#[derive(Debug, Serialize)]
pub struct RefundJobResponse {
    pub success: bool,
    pub credits_refunded: i32,
    pub new_balance: i32,
}

/// `POST /jobs/{id}/refund` — idempotent manual refund trigger (spec
/// section 4.4, I3). In steady state the worker's automatic refund on
/// failure has already run this to completion, so the common response
/// here is a `FailedPrecondition` ("already refunded").
pub async fn refund_job(
    VerifiedCaller(ctx): VerifiedCaller,
    State(state): State<JobsState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RefundJobResponse>> {
    let mut tx = state.repos.begin().await?;
    let outcome = refund_job_tx(&mut tx, id, ctx.user_id).await?;
    tx.commit().await?;

    match outcome {
        RefundJobOutcome::Refunded { credits_refunded, new_balance } => {
            Ok(Json(RefundJobResponse { success: true, credits_refunded, new_balance }))
        }
        RefundJobOutcome::AlreadyRefunded => Err(Error::FailedPrecondition(
            "job credits have already been refunded".to_string(),
        )),
    }
}

/// `GET /jobs/{id}/events` (SSE, supplemented from the teacher's
/// generation-events idiom) — polls the append-only event stream until the
/// job reaches a terminal state or a maximum duration elapses.
pub async fn get_job_events(
    VerifiedCaller(ctx): VerifiedCaller,
    State(state): State<JobsState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Sse<impl futures_core::Stream<Item = std::result::Result<Event, std::convert::Infallible>>>> {
    state
        .repos
        .jobs
        .find(id, ctx.user_id)
        .await?
        .ok_or_else(|| Error::NotFound("Job not found".to_string()))?;

    let after_sequence = headers
        .get("Last-Event-ID")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit(':').next().and_then(|s| s.parse::<i64>().ok()));

    let job_id = id;
    let user_id = ctx.user_id;
    let repos = state.repos.clone();

    let stream = async_stream::stream! {
        let mut last_seq = after_sequence.unwrap_or(0);
        let mut iterations: u32 = 0;
        const MAX_ITERATIONS: u32 = 900;

        loop {
            let events = match repos.job_events.list_by_job(job_id, Some(last_seq)).await {
                Ok(events) => events,
                Err(_) => break,
            };

            for event in &events {
                let event_type_str = serde_json::to_string(&event.event_type)
                    .unwrap_or_else(|_| "unknown".to_string())
                    .replace('"', "");
                let data = serde_json::to_string(&event.payload.0).unwrap_or_else(|_| "{}".to_string());

                let sse_event = Event::default()
                    .id(format!("{}:{}", job_id, event.sequence))
                    .event(event_type_str)
                    .data(data);

                yield Ok(sse_event);
                last_seq = event.sequence;
            }

            let current = match repos.jobs.find(job_id, user_id).await {
                Ok(Some(job)) => job,
                _ => break,
            };
            if current.is_terminal() {
                break;
            }

            iterations += 1;
            if iterations >= MAX_ITERATIONS {
                break;
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
        }
    };

    Ok(Sse::new(stream))
}
