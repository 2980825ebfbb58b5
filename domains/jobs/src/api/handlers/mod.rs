//! HTTP handlers for the Jobs domain

pub mod jobs;
pub mod shoots;
pub mod uploads;
