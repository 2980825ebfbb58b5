//! Job repository: ownership-scoped reads over an otherwise
//! transaction-driven write path (writes live in `transactions.rs`, since
//! every job write must co-occur with a credit or event write inside one
//! commit).

use crate::domain::entities::{Job, JobStatus};
use luster_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a job by id, scoped to its owner. Cross-user lookups come back
    /// `None` here so the handler can report `not_found` rather than
    /// `forbidden` (spec section 4.4: "cross-user access returns not_found").
    pub async fn find(&self, id: Uuid, user_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, Job>(
            r#"
            SELECT id, asset_id, user_id, prompt, tier, status, credits_used, output_key, error,
                   started_at, completed_at, lease_expires_at, retry_count, max_retries,
                   created_at, updated_at
            FROM jobs
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// List a user's jobs, optionally filtered by status, newest first.
    pub async fn list_by_user(
        &self,
        user_id: Uuid,
        status_filter: Option<JobStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>> {
        let rows = match status_filter {
            Some(status) => {
                sqlx::query_as::<_, Job>(
                    r#"
                    SELECT id, asset_id, user_id, prompt, tier, status, credits_used, output_key, error,
                           started_at, completed_at, lease_expires_at, retry_count, max_retries,
                           created_at, updated_at
                    FROM jobs
                    WHERE user_id = $1 AND status = $2
                    ORDER BY created_at DESC
                    LIMIT $3 OFFSET $4
                    "#,
                )
                .bind(user_id)
                .bind(status)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Job>(
                    r#"
                    SELECT id, asset_id, user_id, prompt, tier, status, credits_used, output_key, error,
                           started_at, completed_at, lease_expires_at, retry_count, max_retries,
                           created_at, updated_at
                    FROM jobs
                    WHERE user_id = $1
                    ORDER BY created_at DESC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    /// List every job bound to an asset (used by the shoot-delete cascade
    /// to collect output keys that need best-effort store cleanup).
    pub async fn list_by_asset(&self, asset_id: Uuid) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, Job>(
            r#"
            SELECT id, asset_id, user_id, prompt, tier, status, credits_used, output_key, error,
                   started_at, completed_at, lease_expires_at, retry_count, max_retries,
                   created_at, updated_at
            FROM jobs
            WHERE asset_id = $1
            "#,
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
