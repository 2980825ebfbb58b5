//! Pool-level Credit Ledger facade.
//!
//! Wraps the transaction-scoped functions in `transactions` with their own
//! commit when the caller isn't already inside a shared transaction (e.g.
//! a plain balance read, or a standalone webhook delivery).

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{ApplyOutcome, RefundOutcome, ReserveOutcome};
use crate::transactions;
use luster_common::Result;

#[derive(Clone)]
pub struct CreditsLedger {
    pool: PgPool,
}

impl CreditsLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn reserve(&self, user_id: Uuid, amount: i32) -> Result<ReserveOutcome> {
        let mut tx = self.pool.begin().await?;
        let outcome = transactions::reserve_tx(&mut tx, user_id, amount).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn refund(&self, user_id: Uuid, amount: i32, job_id: Uuid) -> Result<RefundOutcome> {
        let mut tx = self.pool.begin().await?;
        let outcome = transactions::refund_tx(&mut tx, user_id, amount, job_id).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn apply_delta(
        &self,
        user_id: Uuid,
        delta: i32,
        event_type: &str,
        event_id: &str,
    ) -> Result<ApplyOutcome> {
        let mut tx = self.pool.begin().await?;
        let outcome =
            transactions::apply_delta_tx(&mut tx, user_id, delta, event_type, event_id).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn balance(&self, user_id: Uuid) -> Result<i32> {
        let mut tx = self.pool.begin().await?;
        let balance = transactions::balance_tx(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(balance)
    }
}
