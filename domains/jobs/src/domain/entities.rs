//! Core entities: shoots, assets, jobs, and job events.
//!
//! Mirrors the data model in spec section 3: a `Shoot` owns `Asset`s, an
//! `Asset` owns `Job`s, and every `Job` carries an append-only stream of
//! `JobEventRecord`s. Credit balance itself lives on `luster_credits::User`,
//! not here.

use chrono::{DateTime, Utc};
use luster_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use super::state::JobState;

/// Pricing tier selected at job creation. Maps to a credit cost and to
/// downstream provider quality parameters through a static table, not a
/// string the provider interprets directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Premium,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Premium => "premium",
        }
    }

    /// Resolve credit cost from the configured tier table, falling back to
    /// the spec's documented defaults (free=1, premium=2) if a tier is
    /// absent from configuration.
    pub fn cost(&self, credits_per_tier: &std::collections::HashMap<String, i32>) -> i32 {
        credits_per_tier
            .get(self.as_str())
            .copied()
            .unwrap_or(match self {
                Tier::Free => 1,
                Tier::Premium => 2,
            })
    }
}

impl std::str::FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "free" => Ok(Tier::Free),
            "premium" => Ok(Tier::Premium),
            other => Err(Error::Validation(format!("Unknown tier '{other}'"))),
        }
    }
}

/// Job status (spec section 3: four-state enum, no user-initiated cancellation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "job_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn to_state(self) -> JobState {
        match self {
            JobStatus::Queued => JobState::Queued,
            JobStatus::Processing => JobState::Processing,
            JobStatus::Succeeded => JobState::Succeeded,
            JobStatus::Failed => JobState::Failed,
        }
    }

    pub fn from_state(state: JobState) -> Self {
        match state {
            JobState::Queued => JobStatus::Queued,
            JobState::Processing => JobStatus::Processing,
            JobState::Succeeded => JobStatus::Succeeded,
            JobState::Failed => JobStatus::Failed,
        }
    }
}

/// Job event type (spec section 3: append-only `JobEvent`).
///
/// `CreditsRefunded` is the refund marker I3 requires: idempotency checks
/// for `refund` look for at most one `CreditsRefunded` event per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "job_event_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobEventType {
    Created,
    Started,
    Succeeded,
    Failed,
    CreditsRefunded,
}

/// A real-estate photo shoot: the top-level container a user organizes
/// assets and jobs under.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Shoot {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shoot {
    pub fn new(user_id: Uuid, name: String) -> Result<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation("Shoot name must not be empty".into()));
        }
        if trimmed.len() > 255 {
            return Err(Error::Validation(
                "Shoot name must be 255 characters or fewer".into(),
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            name: trimmed.to_string(),
            created_at: now,
            updated_at: now,
        })
    }
}

/// An uploaded source image with an immutable object key (spec I7).
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Asset {
    pub id: Uuid,
    pub shoot_id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub object_key: String,
    pub size_bytes: i64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

/// Content types the intake API will presign uploads for.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/heic"];

/// Maximum upload size in bytes (spec section 4.4: "max_bytes <= 50 MiB").
pub const MAX_UPLOAD_BYTES: i64 = 50 * 1024 * 1024;

impl Asset {
    pub fn validate_content_type(content_type: &str) -> Result<()> {
        if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
            return Err(Error::Validation(format!(
                "Unsupported content type '{content_type}'"
            )));
        }
        Ok(())
    }

    pub fn validate_size(size_bytes: i64) -> Result<()> {
        if size_bytes <= 0 || size_bytes > MAX_UPLOAD_BYTES {
            return Err(Error::Validation(format!(
                "Asset size must be between 1 and {MAX_UPLOAD_BYTES} bytes"
            )));
        }
        Ok(())
    }

    /// Build an asset row at upload-confirm time. `id` is the id
    /// pre-allocated by `presign_upload` so the object key handed out
    /// there and the row created here agree without a second round trip.
    pub fn new(
        id: Uuid,
        shoot_id: Uuid,
        user_id: Uuid,
        filename: String,
        object_key: String,
        size_bytes: i64,
        content_type: String,
    ) -> Result<Self> {
        Self::validate_content_type(&content_type)?;
        Self::validate_size(size_bytes)?;
        Ok(Self {
            id,
            shoot_id,
            user_id,
            filename,
            object_key,
            size_bytes,
            content_type,
            created_at: Utc::now(),
        })
    }
}

/// A unit of enhancement work bound to one asset and one prompt.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub user_id: Uuid,
    pub prompt: String,
    pub tier: Tier,
    pub status: JobStatus,
    pub credits_used: i32,
    pub output_key: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        asset_id: Uuid,
        user_id: Uuid,
        prompt: String,
        tier: Tier,
        credits_used: i32,
        max_retries: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            asset_id,
            user_id,
            prompt,
            tier,
            status: JobStatus::Queued,
            credits_used,
            output_key: None,
            error: None,
            started_at: None,
            completed_at: None,
            lease_expires_at: None,
            retry_count: 0,
            max_retries,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Net credit delta of a terminal job against the balance at creation
    /// time (spec P2): `0` for `failed`, `-credits_used` for `succeeded`.
    pub fn net_credits(&self) -> Option<i32> {
        match self.status {
            JobStatus::Succeeded => Some(-self.credits_used),
            JobStatus::Failed => Some(0),
            _ => None,
        }
    }

    /// Invariants enforced in-process in addition to the `CHECK`
    /// constraints documented in DESIGN.md.
    pub fn validate(&self) -> Result<()> {
        if self.retry_count > self.max_retries {
            return Err(Error::Validation(
                "retry_count must not exceed max_retries (I6)".into(),
            ));
        }
        if self.status.is_terminal() {
            if self.lease_expires_at.is_some() {
                return Err(Error::Validation(
                    "terminal jobs must have no lease (I5)".into(),
                ));
            }
            if self.completed_at.is_none() {
                return Err(Error::Validation(
                    "terminal jobs must record completed_at".into(),
                ));
            }
        }
        if self.status == JobStatus::Succeeded && self.output_key.is_none() {
            return Err(Error::Validation(
                "succeeded jobs must carry an output_key".into(),
            ));
        }
        if self.status == JobStatus::Failed && self.error.is_none() {
            return Err(Error::Validation(
                "failed jobs must carry an error message".into(),
            ));
        }
        Ok(())
    }
}

/// Append-only audit record for a job (spec section 3: `JobEvent`).
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct JobEventRecord {
    pub id: Uuid,
    pub job_id: Uuid,
    pub sequence: i64,
    pub event_type: JobEventType,
    pub payload: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
