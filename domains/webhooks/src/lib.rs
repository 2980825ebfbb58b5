//! Webhook Sink: verifies and applies signed billing events idempotently.

pub mod api;
pub mod domain;

pub use api::{routes, WebhooksState};
pub use domain::entities::{BillingEvent, BillingEventType, BillingWebhookPayload};
