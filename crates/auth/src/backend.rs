//! Concrete authentication backend
//!
//! Wraps `PgPool` + `AuthConfig`. Owns the one auth-specific query this
//! system needs: looking up (and, on first sight, JIT-provisioning) the
//! `users` row behind a verified JWT subject. Credit balance and shoots are
//! owned by other domains; this crate only ever reads/writes `id`/`email`.

use sqlx::PgPool;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::context::AuthContext;
use crate::error::AuthError;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
}

/// Concrete authentication backend.
///
/// Domain states expose this via `FromRef`:
/// ```ignore
/// impl FromRef<MyDomainState> for AuthBackend {
///     fn from_ref(state: &MyDomainState) -> Self {
///         state.auth.clone()
///     }
/// }
/// ```
#[derive(Clone)]
pub struct AuthBackend {
    pool: PgPool,
    config: AuthConfig,
}

impl AuthBackend {
    pub fn new(pool: PgPool, config: AuthConfig) -> Self {
        Self { pool, config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRow>, AuthError> {
        sqlx::query_as("SELECT id, email FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, user_id = %id, "Failed to load user");
                AuthError::UserLoadError
            })
    }

    /// Provision a new user row from JWT claims (JIT user provisioning,
    /// spec §3: "created on first authenticated request or webhook").
    ///
    /// `ON CONFLICT DO NOTHING` makes concurrent first-requests for the
    /// same user race-safe without an explicit lock.
    async fn provision_user(&self, user_id: Uuid, email: &str) -> Result<UserRow, AuthError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, credits, created_at, updated_at)
            VALUES ($1, $2, 0, NOW(), NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %user_id, "Failed to provision user");
            AuthError::UserProvisionFailed
        })?;

        tracing::info!(user_id = %user_id, email = %email, "JIT user provisioned");

        self.find_user(user_id).await?.ok_or_else(|| {
            tracing::error!(user_id = %user_id, "User not found after provisioning");
            AuthError::UserProvisionFailed
        })
    }

    /// Verify a bearer token and return the caller's context, provisioning
    /// a user row on first sight.
    pub(crate) async fn authenticate_jwt(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = crate::jwt::validate_jwt_token(token, &self.config)?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidUserId)?;

        let user = match self.find_user(user_id).await? {
            Some(user) => user,
            None => {
                let email = claims.email.as_deref().ok_or(AuthError::MissingEmail)?;
                self.provision_user(user_id, email).await?
            }
        };

        Ok(AuthContext::new(user.id, user.email))
    }
}
