//! Object key layout (spec section 6):
//!
//! ```text
//! {user_id}/{shoot_id}/{asset_id}/original{ext}
//! {user_id}/{shoot_id}/{asset_id}/outputs/{job_id}.jpg
//! ```
//!
//! Centralized here so the Intake API and the worker never hand-format a
//! key independently and drift apart.

use uuid::Uuid;

/// Build the key an uploaded original is stored under.
pub fn original_key(user_id: Uuid, shoot_id: Uuid, asset_id: Uuid, extension: &str) -> String {
    let ext = extension.trim_start_matches('.');
    format!("{user_id}/{shoot_id}/{asset_id}/original.{ext}")
}

/// Build the key a job's enhanced output is stored under. Content-overwritable
/// by job id (spec section 8: a worker retrying after a crash overwrites the
/// same key rather than producing a new one).
pub fn output_key(user_id: Uuid, shoot_id: Uuid, asset_id: Uuid, job_id: Uuid) -> String {
    format!("{user_id}/{shoot_id}/{asset_id}/outputs/{job_id}.jpg")
}

/// Extension inferred from a declared content type, for naming the
/// original object. Falls back to `bin` for anything outside the image
/// allow-list (the allow-list itself is enforced by `luster_jobs::Asset`).
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/heic" => "heic",
        _ => "bin",
    }
}
