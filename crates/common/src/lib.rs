//! Shared utilities, configuration, and error handling for Luster
//!
//! This crate provides common functionality used across the Luster application:
//! - Configuration management following 12-factor principles
//! - Error types and handling
//! - Cryptographic helpers (constant-time comparison, API key hashing)
//! - Request validation extractors

pub mod config;
pub mod crypto;
pub mod error;
pub mod extractors;

pub use config::Config;
pub use error::{Error, Result};
pub use extractors::ValidatedJson;
