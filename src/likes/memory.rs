use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{StoreError, StoreResult};
use crate::likes::repo::LikeRepository;
use crate::likes::repo_types::Like;

const PAIR_CONSTRAINT: &str = "likes_user_property_key";

/// In-memory LikeRepository with the same pair constraint as the schema.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLikeRepository {
    likes: Arc<RwLock<HashMap<Uuid, Like>>>,
}

impl InMemoryLikeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LikeRepository for InMemoryLikeRepository {
    async fn find(&self, user_id: Uuid, property_id: Uuid) -> StoreResult<Option<Like>> {
        let likes = self.likes.read().await;
        Ok(likes
            .values()
            .find(|l| l.user_id == user_id && l.property_id == property_id)
            .cloned())
    }

    async fn insert(&self, like: &Like) -> StoreResult<Like> {
        let mut likes = self.likes.write().await;
        if likes
            .values()
            .any(|l| l.user_id == like.user_id && l.property_id == like.property_id)
        {
            return Err(StoreError::UniqueViolation(PAIR_CONSTRAINT.into()));
        }
        likes.insert(like.id, like.clone());
        Ok(like.clone())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.likes.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_is_unique() {
        let repo = InMemoryLikeRepository::new();
        let (user, property) = (Uuid::new_v4(), Uuid::new_v4());
        repo.insert(&Like::new(user, property)).await.unwrap();

        let err = repo.insert(&Like::new(user, property)).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(c) if c == PAIR_CONSTRAINT));

        // other pairs are independent
        repo.insert(&Like::new(user, Uuid::new_v4())).await.unwrap();
        repo.insert(&Like::new(Uuid::new_v4(), property)).await.unwrap();
    }

    #[tokio::test]
    async fn delete_is_hard_and_reports_absence() {
        let repo = InMemoryLikeRepository::new();
        let like = repo
            .insert(&Like::new(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();
        assert!(repo.delete(like.id).await.unwrap());
        assert!(!repo.delete(like.id).await.unwrap());
        assert!(repo
            .find(like.user_id, like.property_id)
            .await
            .unwrap()
            .is_none());
    }
}
