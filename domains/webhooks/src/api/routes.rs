//! Route definitions for the Webhooks domain API

use axum::{routing::post, Router};

use super::handlers;
use super::middleware::WebhooksState;

/// Create all Webhooks domain API routes
pub fn routes() -> Router<WebhooksState> {
    Router::new().route("/webhooks/billing", post(handlers::billing_webhook))
}
