//! Asset repository.

use crate::domain::entities::Asset;
use luster_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct AssetRepository {
    pool: PgPool,
}

impl AssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the asset row at upload-confirm time, bound to the
    /// pre-allocated id handed out by `presign_upload` (spec section 4.4).
    pub async fn create(&self, asset: &Asset) -> Result<Asset> {
        let row = sqlx::query_as::<_, Asset>(
            r#"
            INSERT INTO assets (id, shoot_id, user_id, filename, object_key, size_bytes, content_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, shoot_id, user_id, filename, object_key, size_bytes, content_type, created_at
            "#,
        )
        .bind(asset.id)
        .bind(asset.shoot_id)
        .bind(asset.user_id)
        .bind(&asset.filename)
        .bind(&asset.object_key)
        .bind(asset.size_bytes)
        .bind(&asset.content_type)
        .bind(asset.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find(&self, id: Uuid, user_id: Uuid) -> Result<Option<Asset>> {
        let row = sqlx::query_as::<_, Asset>(
            r#"
            SELECT id, shoot_id, user_id, filename, object_key, size_bytes, content_type, created_at
            FROM assets
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Unscoped lookup by id, used by the worker — a trusted internal
    /// process that already knows the asset id from the claimed job row
    /// and has no caller identity to scope against.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Asset>> {
        let row = sqlx::query_as::<_, Asset>(
            r#"
            SELECT id, shoot_id, user_id, filename, object_key, size_bytes, content_type, created_at
            FROM assets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// List every asset under a shoot (used by the shoot-delete cascade).
    pub async fn list_by_shoot(&self, shoot_id: Uuid) -> Result<Vec<Asset>> {
        let rows = sqlx::query_as::<_, Asset>(
            r#"
            SELECT id, shoot_id, user_id, filename, object_key, size_bytes, content_type, created_at
            FROM assets
            WHERE shoot_id = $1
            "#,
        )
        .bind(shoot_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
