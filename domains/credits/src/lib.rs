//! Credit Ledger: per-user integer balance with atomic reserve/refund/apply_delta.
//!
//! Credit is folded into `User.credits`; there is no separate table. The
//! invariant that matters everywhere in this crate is I1 (balance never
//! negative) and I3 (a refund or applied delta is never double-counted).

pub mod api;
pub mod entities;
pub mod ledger;
pub mod transactions;

pub use api::{routes, CreditsState};
pub use entities::{ApplyOutcome, RefundOutcome, ReserveOutcome, User, WebhookDelivery};
pub use ledger::CreditsLedger;
