//! Route definitions for Credits domain API

use axum::{routing::get, Router};

use super::handlers;
use super::middleware::CreditsState;

/// Create all Credits domain API routes
pub fn routes() -> Router<CreditsState> {
    Router::new().route("/credits", get(handlers::get_balance))
}
