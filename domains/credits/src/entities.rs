//! User and ledger outcome types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A user of the system. Credit balance is folded directly onto this row
/// rather than split into a separate 1:1 `Credit` table — the spec's data
/// model treats `Credit` as 1:1 with `User`, so there is nothing a join
/// buys here.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub credits: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of `reserve` (spec section 4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved { new_balance: i32 },
    Insufficient { balance: i32 },
}

/// Outcome of `refund` (spec section 4.1, I3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundOutcome {
    Refunded { new_balance: i32 },
    AlreadyRefunded,
}

/// Outcome of `apply_delta` (spec section 4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied { new_balance: i32 },
    AlreadyApplied,
}

/// A recorded billing-webhook delivery, keyed for idempotency by
/// `(event_type, event_id)`. This table doesn't exist in the Python
/// original (see DESIGN.md); it's the mechanism `apply_delta` uses to
/// satisfy spec P8 ("a signed webhook replayed verbatim yields the same
/// final balance as a single delivery").
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WebhookDelivery {
    pub event_type: String,
    pub event_id: String,
    pub user_id: Uuid,
    pub delta: i32,
    pub created_at: DateTime<Utc>,
}
