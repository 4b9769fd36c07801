use axum::{
    extract::{DefaultBodyLimit, FromRef, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use bytes::Bytes;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        extractors::AuthUser,
        guard::{ensure_self_or_admin, guarded, Access},
    },
    error::{AppError, AppResult},
    state::AppState,
    users::{
        dto::{CreateUserRequest, ListUsersQuery, UpdateUserRequest, UserListResponse},
        model::{Role, UserResponse},
        services::UserService,
    },
};

const AVATAR_MAX_BYTES: usize = 5 * 1024 * 1024;
const AVATAR_FIELD: &str = "avatar";

pub fn admin_routes(state: &AppState) -> Router<AppState> {
    let routes = Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id/activate", post(activate_user));
    guarded(routes, state, Access::roles(&[Role::Admin]))
}

pub fn member_routes(state: &AppState) -> Router<AppState> {
    let routes = Router::new()
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route(
            "/users/:id/avatar",
            // multipart framing needs a little room over the file itself
            put(upload_avatar).layer(DefaultBodyLimit::max(AVATAR_MAX_BYTES + 64 * 1024)),
        );
    guarded(routes, state, Access::Authenticated)
}

#[instrument(skip(users))]
pub async fn list_users(
    State(users): State<UserService>,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<Json<UserListResponse>> {
    let (found, total) = users.list_users(query.role).await?;
    Ok(Json(UserListResponse {
        users: found.iter().map(|u| u.to_response()).collect(),
        total,
    }))
}

#[instrument(skip(users, payload))]
pub async fn create_user(
    State(users): State<UserService>,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let user = users.create_user(payload).await?;
    Ok((StatusCode::CREATED, Json(user.to_response())))
}

#[instrument(skip(users))]
pub async fn get_user(
    State(users): State<UserService>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    Ok(Json(users.get_user(id).await?.to_response()))
}

#[instrument(skip(users, principal, payload), fields(actor = %principal.id))]
pub async fn update_user(
    State(users): State<UserService>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    ensure_self_or_admin(&principal, id)?;
    if payload.role.is_some() && principal.role != Role::Admin {
        warn!(target_user = %id, "non-admin tried to change a role");
        return Err(AppError::Forbidden("Only admins may change roles".into()));
    }
    Ok(Json(users.update_user(id, payload).await?.to_response()))
}

#[instrument(skip(users, principal), fields(actor = %principal.id))]
pub async fn delete_user(
    State(users): State<UserService>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    ensure_self_or_admin(&principal, id)?;
    Ok(Json(users.delete_user(id).await?.to_response()))
}

#[instrument(skip(users))]
pub async fn activate_user(
    State(users): State<UserService>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    Ok(Json(users.reactivate_user(id).await?.to_response()))
}

fn avatar_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

struct AvatarUpload {
    body: Bytes,
    content_type: String,
    ext: &'static str,
}

async fn read_avatar(multipart: &mut Multipart) -> AppResult<AvatarUpload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some(AVATAR_FIELD) {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let ext = avatar_extension(&content_type).ok_or_else(|| {
            AppError::BadRequest("avatar must be a jpeg, png or webp image".into())
        })?;
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("avatar upload failed: {}", e)))?;
        if body.is_empty() {
            return Err(AppError::BadRequest("avatar file is empty".into()));
        }
        if body.len() > AVATAR_MAX_BYTES {
            return Err(AppError::BadRequest("avatar exceeds 5 MiB".into()));
        }
        return Ok(AvatarUpload {
            body,
            content_type,
            ext,
        });
    }
    Err(AppError::BadRequest(format!(
        "multipart field '{}' is required",
        AVATAR_FIELD
    )))
}

#[instrument(skip(state, principal, multipart), fields(actor = %principal.id))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Json<UserResponse>> {
    ensure_self_or_admin(&principal, id)?;
    let users = UserService::from_ref(&state);
    users.get_user(id).await?;

    let upload = read_avatar(&mut multipart).await?;
    let key = format!("avatars/{}/{}.{}", id, Uuid::new_v4(), upload.ext);
    state
        .storage
        .put_object(&key, upload.body, &upload.content_type)
        .await?;
    info!(user_id = %id, key = %key, "avatar stored");

    let user = users.set_avatar(id, state.storage.public_url(&key)).await?;
    Ok(Json(user.to_response()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_known_image_types_are_accepted() {
        assert_eq!(avatar_extension("image/jpeg"), Some("jpg"));
        assert_eq!(avatar_extension("image/png"), Some("png"));
        assert_eq!(avatar_extension("image/webp"), Some("webp"));
        assert_eq!(avatar_extension("image/gif"), None);
        assert_eq!(avatar_extension(""), None);
    }

    #[test]
    fn list_response_shape() {
        let json = serde_json::to_value(UserListResponse {
            users: vec![],
            total: 0,
        })
        .unwrap();
        assert_eq!(json["total"], 0);
        assert!(json["users"].as_array().unwrap().is_empty());
    }
}
