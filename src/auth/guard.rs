//! Per-route access control.
//!
//! Every route is registered with an [`Access`] rule when the router is
//! built. The guard runs the token check and then the role check; a public
//! rule short-circuits before any header parsing or signature work.

use std::sync::Arc;

use axum::{
    extract::{FromRef, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::{self, Next},
    response::Response,
    Router,
};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::users::model::{Role, User};
use crate::users::repo::UserRepository;

const INVALID_TOKEN: &str = "Invalid or expired token";

/// Authenticated identity attached to a request once the token guard passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id(),
            email: user.email().to_string(),
            role: user.role(),
        }
    }
}

/// Access rule declared for a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Roles(Vec<Role>),
}

impl Access {
    pub fn roles(roles: &[Role]) -> Self {
        Access::Roles(roles.to_vec())
    }

    fn required_roles(&self) -> &[Role] {
        match self {
            Access::Roles(roles) => roles,
            _ => &[],
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> AppResult<&str> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;
    Ok(token)
}

/// Token guard: signature and expiry, then a live lookup of the subject.
/// Claims are never trusted for activity or role; both come from the store.
pub async fn validate_token(
    keys: &JwtKeys,
    users: &dyn UserRepository,
    headers: &HeaderMap,
) -> AppResult<Principal> {
    let token = bearer_token(headers)?;
    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "token rejected");
        AppError::Unauthorized(INVALID_TOKEN.into())
    })?;
    match users.find_by_id(claims.sub).await? {
        Some(user) if user.is_active() => Ok(Principal::from(&user)),
        Some(_) => {
            warn!(user_id = %claims.sub, "token for inactive user");
            Err(AppError::Unauthorized(INVALID_TOKEN.into()))
        }
        None => {
            warn!(user_id = %claims.sub, "token for unknown user");
            Err(AppError::Unauthorized(INVALID_TOKEN.into()))
        }
    }
}

/// Role guard: exact membership, no hierarchy. An empty set allows anyone.
pub fn authorize_roles(principal: &Principal, required: &[Role]) -> AppResult<()> {
    if required.is_empty() || required.contains(&principal.role) {
        return Ok(());
    }
    warn!(user_id = %principal.id, role = %principal.role, "role not allowed");
    Err(AppError::Forbidden("Insufficient role".into()))
}

/// Owner-or-admin rule for routes addressing a specific user.
pub fn ensure_self_or_admin(principal: &Principal, target: Uuid) -> AppResult<()> {
    if principal.id == target || principal.role == Role::Admin {
        Ok(())
    } else {
        warn!(user_id = %principal.id, target = %target, "access to another user denied");
        Err(AppError::Forbidden("Not allowed to act on this user".into()))
    }
}

#[derive(Clone)]
struct GuardState {
    keys: JwtKeys,
    users: Arc<dyn UserRepository>,
    access: Arc<Access>,
}

async fn access_guard(
    State(guard): State<GuardState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if guard.access.as_ref() == &Access::Public {
        return Ok(next.run(req).await);
    }
    let (mut parts, body) = req.into_parts();
    let principal = validate_token(&guard.keys, guard.users.as_ref(), &parts.headers).await?;
    authorize_roles(&principal, guard.access.required_roles())?;
    parts.extensions.insert(principal);
    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Wraps every route of `router` with the guard chain for `access`.
pub fn guarded(router: Router<AppState>, state: &AppState, access: Access) -> Router<AppState> {
    let guard = GuardState {
        keys: JwtKeys::from_ref(state),
        users: state.users.clone(),
        access: Arc::new(access),
    };
    router.route_layer(middleware::from_fn_with_state(guard, access_guard))
}
