use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::StoreError;
use crate::error::{AppError, AppResult};
use crate::likes::repo::LikeRepository;
use crate::likes::repo_types::Like;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Liked(Like),
    Unliked,
}

#[derive(Clone)]
pub struct LikeService {
    repo: Arc<dyn LikeRepository>,
}

impl FromRef<AppState> for LikeService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.likes.clone())
    }
}

impl LikeService {
    pub fn new(repo: Arc<dyn LikeRepository>) -> Self {
        Self { repo }
    }

    /// Flips the (actor, subject) like.
    ///
    /// Find-then-write is not atomic. Two concurrent first toggles both see
    /// no row; the loser's insert hits the pair constraint and converges on
    /// the winner's row instead of failing.
    #[instrument(skip(self))]
    pub async fn toggle(&self, subject_id: Uuid, actor_id: Uuid) -> AppResult<ToggleOutcome> {
        if subject_id == actor_id {
            return Err(AppError::BadRequest("cannot like yourself".into()));
        }

        if let Some(existing) = self.repo.find(actor_id, subject_id).await? {
            // already gone means a concurrent toggle removed it first
            let removed = self.repo.delete(existing.id).await?;
            info!(like_id = %existing.id, removed, "like removed");
            return Ok(ToggleOutcome::Unliked);
        }

        match self.repo.insert(&Like::new(actor_id, subject_id)).await {
            Ok(like) => {
                info!(like_id = %like.id, "like created");
                Ok(ToggleOutcome::Liked(like))
            }
            Err(StoreError::UniqueViolation(constraint)) => {
                warn!(%constraint, "concurrent like detected, converging");
                match self.repo.find(actor_id, subject_id).await? {
                    Some(existing) => Ok(ToggleOutcome::Liked(existing)),
                    None => Err(AppError::Conflict(
                        "like changed concurrently, retry".into(),
                    )),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
