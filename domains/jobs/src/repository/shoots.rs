//! Shoot repository.

use crate::domain::entities::Shoot;
use luster_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct ShootRepository {
    pool: PgPool,
}

impl ShootRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, shoot: &Shoot) -> Result<Shoot> {
        let row = sqlx::query_as::<_, Shoot>(
            r#"
            INSERT INTO shoots (id, user_id, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, name, created_at, updated_at
            "#,
        )
        .bind(shoot.id)
        .bind(shoot.user_id)
        .bind(&shoot.name)
        .bind(shoot.created_at)
        .bind(shoot.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find(&self, id: Uuid, user_id: Uuid) -> Result<Option<Shoot>> {
        let row = sqlx::query_as::<_, Shoot>(
            r#"
            SELECT id, user_id, name, created_at, updated_at
            FROM shoots
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_by_user(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Shoot>> {
        let rows = sqlx::query_as::<_, Shoot>(
            r#"
            SELECT id, user_id, name, created_at, updated_at
            FROM shoots
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
