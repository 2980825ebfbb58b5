//! Upload intake handlers (spec section 4.4: `presign_upload`, `confirm_upload`).

use axum::{extract::State, Json};
use luster_auth::VerifiedCaller;
use luster_common::{Error, Result, ValidatedJson};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::middleware::JobsState;
use crate::domain::entities::{Asset, MAX_UPLOAD_BYTES};

#[derive(Debug, Deserialize, Validate)]
pub struct PresignUploadRequest {
    pub shoot_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    pub content_type: String,
    pub max_bytes: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PresignUploadResponse {
    pub asset_id: Uuid,
    pub object_key: String,
    pub url: String,
    pub fields: std::collections::HashMap<String, String>,
    pub expires_in: i64,
}

/// `POST /uploads/presign`
///
/// Pre-allocates the asset id and its object key but writes no row — the
/// asset only becomes durable once `confirm_upload` verifies the bytes
/// actually landed in the store (spec P6).
pub async fn presign_upload(
    VerifiedCaller(ctx): VerifiedCaller,
    State(state): State<JobsState>,
    ValidatedJson(req): ValidatedJson<PresignUploadRequest>,
) -> Result<Json<PresignUploadResponse>> {
    let shoot = state
        .repos
        .shoots
        .find(req.shoot_id, ctx.user_id)
        .await?
        .ok_or_else(|| Error::NotFound("Shoot not found".to_string()))?;

    Asset::validate_content_type(&req.content_type)?;
    let max_bytes = req.max_bytes.unwrap_or(MAX_UPLOAD_BYTES).min(MAX_UPLOAD_BYTES);
    Asset::validate_size(max_bytes)?;

    let asset_id = Uuid::new_v4();
    let extension = luster_storage::keys::extension_for_content_type(&req.content_type);
    let object_key = luster_storage::keys::original_key(ctx.user_id, shoot.id, asset_id, extension);

    let upload = state
        .store
        .presign_upload(&object_key, &req.content_type, max_bytes, state.config.presign_ttl)
        .await?;

    let expires_in = (upload.expires_at - chrono::Utc::now()).num_seconds().max(0);

    Ok(Json(PresignUploadResponse {
        asset_id,
        object_key,
        url: upload.url,
        fields: upload.fields,
        expires_in,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmUploadRequest {
    pub asset_id: Uuid,
    pub shoot_id: Uuid,
    pub object_key: String,
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    pub size: i64,
    pub content_type: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmUploadResponse {
    pub id: Uuid,
    pub filename: String,
    pub size: i64,
    pub object_key: String,
}

/// `POST /uploads/confirm`
///
/// Verifies the object actually exists in the store before creating the
/// asset row (spec P6: "a confirm_upload whose object is absent at the
/// store creates no asset row").
pub async fn confirm_upload(
    VerifiedCaller(ctx): VerifiedCaller,
    State(state): State<JobsState>,
    ValidatedJson(req): ValidatedJson<ConfirmUploadRequest>,
) -> Result<Json<ConfirmUploadResponse>> {
    state
        .repos
        .shoots
        .find(req.shoot_id, ctx.user_id)
        .await?
        .ok_or_else(|| Error::NotFound("Shoot not found".to_string()))?;

    if !state.store.exists(&req.object_key).await? {
        return Err(Error::FailedPrecondition(
            "uploaded object not found in store".to_string(),
        ));
    }

    let asset = Asset::new(
        req.asset_id,
        req.shoot_id,
        ctx.user_id,
        req.filename,
        req.object_key,
        req.size,
        req.content_type,
    )?;
    let created = state.repos.assets.create(&asset).await?;

    Ok(Json(ConfirmUploadResponse {
        id: created.id,
        filename: created.filename,
        size: created.size_bytes,
        object_key: created.object_key,
    }))
}
