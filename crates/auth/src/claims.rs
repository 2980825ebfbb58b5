//! JWT claims types

use serde::{Deserialize, Serialize};

/// Claims carried by the bearer token issued by the identity provider.
///
/// Verifying the provider's own token internals is out of scope for this
/// service; this struct only names the fields the rest of the system reads
/// off an already-valid token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Email
    pub email: Option<String>,
    /// Issued at
    pub iat: u64,
    /// Expires at
    pub exp: u64,
    /// Audience
    pub aud: String,
    /// Role (authenticated user)
    pub role: String,
}
