//! Shoot management API handlers (spec section 4.4: `create_shoot`,
//! `delete_shoot`, plus the supplemented `list_shoots` discovery path).

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use luster_auth::VerifiedCaller;
use luster_common::{Error, Result, ValidatedJson};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::middleware::JobsState;
use crate::domain::entities::Shoot;
use crate::repository::transactions::delete_shoot_cascade_tx;

#[derive(Debug, Serialize)]
pub struct ShootResponse {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Shoot> for ShootResponse {
    fn from(s: Shoot) -> Self {
        Self { id: s.id, name: s.name, created_at: s.created_at, updated_at: s.updated_at }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateShootRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListShootsParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `POST /shoots`
pub async fn create_shoot(
    VerifiedCaller(ctx): VerifiedCaller,
    State(state): State<JobsState>,
    ValidatedJson(req): ValidatedJson<CreateShootRequest>,
) -> Result<Json<ShootResponse>> {
    let shoot = Shoot::new(ctx.user_id, req.name)?;
    let created = state.repos.shoots.create(&shoot).await?;
    Ok(Json(created.into()))
}

/// `GET /shoots` (supplemented discovery path, see DESIGN.md)
pub async fn list_shoots(
    VerifiedCaller(ctx): VerifiedCaller,
    State(state): State<JobsState>,
    Query(params): Query<ListShootsParams>,
) -> Result<Json<Vec<ShootResponse>>> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let offset = params.offset.unwrap_or(0).max(0);
    let shoots = state.repos.shoots.list_by_user(ctx.user_id, limit, offset).await?;
    Ok(Json(shoots.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Serialize)]
pub struct DeleteShootResponse {
    pub deleted_assets: i64,
    pub deleted_jobs: i64,
}

/// `DELETE /shoots/{id}` — cascades to assets, jobs, and job events in one
/// transaction, then best-effort deletes the corresponding store objects
/// outside it (spec section 4.4: "errors during object deletion are logged
/// and do not abort the DB cascade").
pub async fn delete_shoot(
    VerifiedCaller(ctx): VerifiedCaller,
    State(state): State<JobsState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteShootResponse>> {
    let mut tx = state.repos.begin().await?;
    let cascade = delete_shoot_cascade_tx(&mut tx, id, ctx.user_id)
        .await?
        .ok_or_else(|| Error::NotFound("Shoot not found".to_string()))?;
    tx.commit().await?;

    for key in &cascade.object_keys {
        if let Err(e) = state.store.delete(key).await {
            tracing::warn!(object_key = %key, error = %e, "failed to delete store object during shoot cascade");
        }
    }

    Ok(Json(DeleteShootResponse {
        deleted_assets: cascade.assets_deleted,
        deleted_jobs: cascade.jobs_deleted,
    }))
}
