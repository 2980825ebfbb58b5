//! Transaction-scoped credit operations.
//!
//! Free functions over an open `Transaction`, for composition with other
//! domains' writes inside a single commit boundary — exactly the shape
//! `luster_jobs::repository::transactions` uses for job/event writes.

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::entities::{ApplyOutcome, RefundOutcome, ReserveOutcome, User};
use luster_common::{Error, Result};

/// Atomic reserve: a single conditional `UPDATE` both checks and decrements
/// the balance, so the row's own write lock serializes concurrent reserves
/// against the same user (spec section 4.1 / scenario 5) without an
/// explicit `SELECT ... FOR UPDATE` round trip.
pub async fn reserve_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    amount: i32,
) -> Result<ReserveOutcome> {
    let reserved: Option<i32> = sqlx::query_scalar(
        "UPDATE users SET credits = credits - $2, updated_at = NOW()
         WHERE id = $1 AND credits >= $2
         RETURNING credits",
    )
    .bind(user_id)
    .bind(amount)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(new_balance) = reserved {
        return Ok(ReserveOutcome::Reserved { new_balance });
    }

    let balance: Option<i32> = sqlx::query_scalar("SELECT credits FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

    match balance {
        Some(balance) => Ok(ReserveOutcome::Insufficient { balance }),
        None => Err(Error::NotFound(format!("User {user_id} not found"))),
    }
}

/// Unconditional increment, idempotent per `job_id` (spec I3). The
/// idempotency check reads `job_events` directly — a cross-domain read of
/// the same shape as `luster_jobs`'s own CQRS writes into `artifacts`-style
/// tables — because the refund marker lives on the job's event stream, not
/// in this crate's own tables.
pub async fn refund_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    amount: i32,
    job_id: Uuid,
) -> Result<RefundOutcome> {
    let already: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM job_events WHERE job_id = $1 AND event_type = 'credits_refunded' LIMIT 1",
    )
    .bind(job_id)
    .fetch_optional(&mut **tx)
    .await?;

    if already.is_some() {
        return Ok(RefundOutcome::AlreadyRefunded);
    }

    let new_balance: i32 = sqlx::query_scalar(
        "UPDATE users SET credits = credits + $2, updated_at = NOW() WHERE id = $1 RETURNING credits",
    )
    .bind(user_id)
    .bind(amount)
    .fetch_one(&mut **tx)
    .await?;

    Ok(RefundOutcome::Refunded { new_balance })
}

/// Get-or-create a user row, used by the billing webhook path where a
/// purchase event may arrive for an identity the core has never seen via
/// an authenticated request (grounded on `revenue_cat.py::get_or_create_user`).
pub async fn get_or_create_user_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    email: &str,
) -> Result<User> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, credits, created_at, updated_at)
        VALUES ($1, $2, 0, NOW(), NOW())
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(email)
    .execute(&mut **tx)
    .await?;

    sqlx::query_as("SELECT id, email, credits, created_at, updated_at FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::from)
}

/// Apply a signed delta from the billing webhook, idempotent by
/// `(event_type, event_id)` — a deliberate addition over the Python
/// original, which has no such guard (see DESIGN.md).
pub async fn apply_delta_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    delta: i32,
    event_type: &str,
    event_id: &str,
) -> Result<ApplyOutcome> {
    let already: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM webhook_deliveries WHERE event_type = $1 AND event_id = $2 LIMIT 1",
    )
    .bind(event_type)
    .bind(event_id)
    .fetch_optional(&mut **tx)
    .await?;

    if already.is_some() {
        return Ok(ApplyOutcome::AlreadyApplied);
    }

    let new_balance: i32 = sqlx::query_scalar(
        "UPDATE users SET credits = credits + $2, updated_at = NOW() WHERE id = $1 RETURNING credits",
    )
    .bind(user_id)
    .bind(delta)
    .fetch_one(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO webhook_deliveries (event_type, event_id, user_id, delta, created_at)
        VALUES ($1, $2, $3, $4, NOW())
        "#,
    )
    .bind(event_type)
    .bind(event_id)
    .bind(user_id)
    .bind(delta)
    .execute(&mut **tx)
    .await?;

    Ok(ApplyOutcome::Applied { new_balance })
}

pub async fn balance_tx(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<i32> {
    sqlx::query_scalar("SELECT credits FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {user_id} not found")))
}
