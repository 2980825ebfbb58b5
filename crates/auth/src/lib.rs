//! Bearer-token authentication for the Luster API
//!
//! Identity and token issuance are out of scope for this system (spec §1);
//! this crate only verifies that a bearer token is a validly-signed JWT and
//! extracts the caller's user id and email from its claims. Ownership is
//! flat (no teams/tiers/API keys) — every resource belongs to exactly one
//! user, checked via `AuthContext::owns`.

mod backend;
mod claims;
mod config;
mod context;
mod error;
mod extractors;
mod jwt;

pub use backend::AuthBackend;
pub use claims::Claims;
pub use config::AuthConfig;
pub use context::AuthContext;
pub use error::AuthError;
pub use extractors::VerifiedCaller;
