//! Integration test entry point
//!
//! Exercises the Credit Ledger, Job Store/Intake API, Dispatcher, and
//! Webhook Sink end to end against a real Postgres pool.

mod auth;
#[allow(dead_code)]
mod common;
mod credits;
mod invariants;
mod jobs;
mod webhooks;
