use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::StoreResult;
use crate::likes::repo_types::{Like, LIKE_COLUMNS};

/// Persistence contract for likes. Removal is a hard delete.
///
/// `insert` must fail with `StoreError::UniqueViolation` when the pair
/// already exists; callers rely on it to settle concurrent toggles.
#[async_trait]
pub trait LikeRepository: Send + Sync {
    async fn find(&self, user_id: Uuid, property_id: Uuid) -> StoreResult<Option<Like>>;
    async fn insert(&self, like: &Like) -> StoreResult<Like>;
    /// Returns false when the row was already gone.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

#[derive(Clone)]
pub struct PgLikeRepository {
    db: PgPool,
}

impl PgLikeRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LikeRepository for PgLikeRepository {
    async fn find(&self, user_id: Uuid, property_id: Uuid) -> StoreResult<Option<Like>> {
        let like = sqlx::query_as::<_, Like>(&format!(
            "SELECT {} FROM likes WHERE user_id = $1 AND property_id = $2",
            LIKE_COLUMNS
        ))
        .bind(user_id)
        .bind(property_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(like)
    }

    async fn insert(&self, like: &Like) -> StoreResult<Like> {
        let like = sqlx::query_as::<_, Like>(&format!(
            r#"
            INSERT INTO likes (id, user_id, property_id, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            LIKE_COLUMNS
        ))
        .bind(like.id)
        .bind(like.user_id)
        .bind(like.property_id)
        .bind(like.created_at)
        .fetch_one(&self.db)
        .await?;
        Ok(like)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
