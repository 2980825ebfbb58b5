//! Jobs domain state and auth backend integration

use std::sync::Arc;

use axum::extract::FromRef;
use luster_auth::AuthBackend;
use luster_common::Config;
use luster_storage::ObjectStore;

use crate::repository::JobsRepositories;

/// Application state for the Jobs domain. Holds everything a shoot/upload/job
/// handler needs: the repository facade, the auth backend, the object store
/// (for presign/exists checks), and the shared configuration (tier pricing,
/// lease duration, presign TTL).
#[derive(Clone)]
pub struct JobsState {
    pub repos: JobsRepositories,
    pub auth: AuthBackend,
    pub store: Arc<dyn ObjectStore>,
    pub config: Arc<Config>,
}

impl FromRef<JobsState> for AuthBackend {
    fn from_ref(state: &JobsState) -> Self {
        state.auth.clone()
    }
}
