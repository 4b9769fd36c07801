use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{
        extractors::AuthUser,
        guard::{guarded, Access},
    },
    error::AppResult,
    likes::{
        repo_types::Like,
        services::{LikeService, ToggleOutcome},
    },
    state::AppState,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleLikeResponse {
    pub liked: bool,
    pub like: Option<Like>,
}

pub fn like_routes(state: &AppState) -> Router<AppState> {
    let routes = Router::new().route("/likes/:property_id", post(toggle_like));
    guarded(routes, state, Access::Authenticated)
}

#[instrument(skip(likes, principal), fields(user_id = %principal.id))]
pub async fn toggle_like(
    State(likes): State<LikeService>,
    AuthUser(principal): AuthUser,
    Path(property_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ToggleLikeResponse>)> {
    let response = match likes.toggle(property_id, principal.id).await? {
        ToggleOutcome::Liked(like) => (
            StatusCode::CREATED,
            Json(ToggleLikeResponse {
                liked: true,
                like: Some(like),
            }),
        ),
        ToggleOutcome::Unliked => (
            StatusCode::OK,
            Json(ToggleLikeResponse {
                liked: false,
                like: None,
            }),
        ),
    };
    Ok(response)
}
