//! Axum extractors for authentication
//!
//! Generic over any state `S` where `AuthBackend: FromRef<S>`.
//! This is axum's idiomatic nested-state pattern.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::backend::AuthBackend;
use crate::context::AuthContext;
use crate::error::AuthError;
use crate::jwt::extract_bearer_token;

/// A caller whose bearer token has been verified against the identity
/// provider's signing secret.
///
/// This is the only authenticated-caller extractor the core needs — spec
/// §1 puts identity/token verification itself out of scope, so the
/// extractor accepts any `Authorization: Bearer <token>` whose claims
/// `AuthBackend` can parse into a user id and email.
#[derive(Debug)]
pub struct VerifiedCaller(pub AuthContext);

impl<S> FromRequestParts<S> for VerifiedCaller
where
    AuthBackend: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let backend = AuthBackend::from_ref(state);

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthorization)?;

        let token = extract_bearer_token(auth_header)?;
        let auth_context = backend.authenticate_jwt(&token).await?;

        Ok(VerifiedCaller(auth_context))
    }
}
