//! Credits domain state and auth backend integration

use axum::extract::FromRef;
use luster_auth::AuthBackend;

use crate::ledger::CreditsLedger;

/// Application state for the Credits domain
#[derive(Clone)]
pub struct CreditsState {
    pub ledger: CreditsLedger,
    pub auth: AuthBackend,
}

impl FromRef<CreditsState> for AuthBackend {
    fn from_ref(state: &CreditsState) -> Self {
        state.auth.clone()
    }
}
