//! API layer for the Webhooks domain
//!
//! Contains HTTP handlers, routes, and domain state definition.

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use middleware::WebhooksState;
pub use routes::routes;
