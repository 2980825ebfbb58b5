//! Authorization context for authenticated callers
//!
//! Ownership in this system is flat: every resource belongs to exactly one
//! user, identified by `Uuid`. There is no team/organization layer, so the
//! only access check that exists is "does this resource's owner match the
//! caller's user id" — and a mismatch must always be reported as not-found,
//! never as forbidden, so that probing another user's resource ids leaks no
//! information about their existence.

use uuid::Uuid;

/// Represents an authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
}

impl AuthContext {
    pub fn new(user_id: Uuid, email: String) -> Self {
        Self { user_id, email }
    }

    /// Check whether the caller owns a resource with the given owner id.
    pub fn owns(&self, owner_id: Uuid) -> bool {
        owner_id == self.user_id
    }
}
