//! Webhooks domain state.
//!
//! Unlike the Jobs/Credits domain states, this one has no `AuthBackend`
//! `FromRef` — `POST /webhooks/billing` is one of the two unauthenticated
//! endpoints the spec explicitly enumerates (spec section 6).

use std::sync::Arc;

use luster_common::Config;
use luster_credits::CreditsLedger;

#[derive(Clone)]
pub struct WebhooksState {
    pub ledger: CreditsLedger,
    pub config: Arc<Config>,
}
