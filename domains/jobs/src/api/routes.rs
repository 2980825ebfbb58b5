//! Route definitions for Jobs domain API

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{jobs, shoots, uploads};
use super::middleware::JobsState;

/// Create all Jobs domain API routes
pub fn routes() -> Router<JobsState> {
    Router::new()
        .route("/shoots", post(shoots::create_shoot).get(shoots::list_shoots))
        .route("/shoots/{id}", axum::routing::delete(shoots::delete_shoot))
        .route("/uploads/presign", post(uploads::presign_upload))
        .route("/uploads/confirm", post(uploads::confirm_upload))
        .route("/jobs", post(jobs::create_job).get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs/{id}/refund", post(jobs::refund_job))
        .route("/jobs/{id}/events", get(jobs::get_job_events))
}
