use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::guard::Principal;
use crate::error::AppError;

/// The principal resolved by the access guard for this request.
///
/// Only valid on guarded, non-public routes; elsewhere it rejects with 401.
pub struct AuthUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
    }
}
