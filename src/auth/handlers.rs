use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest, TokenResponse},
        extractors::AuthUser,
        guard::{guarded, Access},
        services::AuthService,
    },
    error::AppResult,
    state::AppState,
    users::{model::UserResponse, services::UserService},
};

pub fn public_routes(state: &AppState) -> Router<AppState> {
    let routes = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login));
    guarded(routes, state, Access::Public)
}

pub fn session_routes(state: &AppState) -> Router<AppState> {
    let routes = Router::new()
        .route("/auth/profile", get(profile))
        .route("/auth/refresh", post(refresh));
    guarded(routes, state, Access::Authenticated)
}

#[instrument(skip(auth, payload))]
pub async fn register(
    State(auth): State<AuthService>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let (user, issued) = auth.register(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            user: user.to_response(),
        }),
    ))
}

#[instrument(skip(auth, payload))]
pub async fn login(
    State(auth): State<AuthService>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let (user, issued) = auth.login(payload).await?;
    Ok(Json(AuthResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user: user.to_response(),
    }))
}

#[instrument(skip(users, principal), fields(user_id = %principal.id))]
pub async fn profile(
    State(users): State<UserService>,
    AuthUser(principal): AuthUser,
) -> AppResult<Json<UserResponse>> {
    Ok(Json(users.get_user(principal.id).await?.to_response()))
}

#[instrument(skip(auth, principal), fields(user_id = %principal.id))]
pub async fn refresh(
    State(auth): State<AuthService>,
    AuthUser(principal): AuthUser,
) -> AppResult<Json<TokenResponse>> {
    let issued = auth.refresh(&principal)?;
    Ok(Json(TokenResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}
