use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, instrument, warn};

use super::dto::{LoginRequest, RegisterRequest};
use super::guard::Principal;
use super::jwt::{IssuedToken, JwtKeys};
use super::password::CredentialManager;
use crate::error::{AppError, AppResult, ValidationError};
use crate::state::AppState;
use crate::users::dto::CreateUserRequest;
use crate::users::model::{normalize_email, Role, User};
use crate::users::repo::UserRepository;
use crate::users::services::UserService;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Registration, login and token refresh.
#[derive(Clone)]
pub struct AuthService {
    users: UserService,
    repo: Arc<dyn UserRepository>,
    creds: Arc<CredentialManager>,
    keys: JwtKeys,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.users.clone(),
            state.credentials.clone(),
            JwtKeys::from_ref(state),
        )
    }
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized(INVALID_CREDENTIALS.into())
}

impl AuthService {
    pub fn new(
        repo: Arc<dyn UserRepository>,
        creds: Arc<CredentialManager>,
        keys: JwtKeys,
    ) -> Self {
        Self {
            users: UserService::new(repo.clone(), creds.clone()),
            repo,
            creds,
            keys,
        }
    }

    /// Creates a buyer or seller account and signs a token for it.
    /// Admin accounts are only created by other admins or at bootstrap.
    #[instrument(skip(self, req))]
    pub async fn register(&self, req: RegisterRequest) -> AppResult<(User, IssuedToken)> {
        if req.role == Role::Admin {
            return Err(ValidationError::rule("role must be buyer or seller").into());
        }
        let user = self
            .users
            .create_user(CreateUserRequest {
                name: req.name,
                email: req.email,
                password: req.password,
                avatar: None,
                role: req.role,
            })
            .await?;
        let token = self.keys.sign(&Principal::from(&user))?;
        info!(user_id = %user.id(), "user registered");
        Ok((user, token))
    }

    /// Unknown email, wrong password and deactivated account all fail the
    /// same way. A dummy verification runs on a miss to even out timing.
    #[instrument(skip(self, req))]
    pub async fn login(&self, req: LoginRequest) -> AppResult<(User, IssuedToken)> {
        let email = normalize_email(&req.email);
        let Some(user) = self.repo.find_by_email(&email).await? else {
            self.creds.verify_dummy_blocking(req.password).await;
            warn!(email = %email, "login unknown email");
            return Err(invalid_credentials());
        };

        let ok = self
            .creds
            .verify_blocking(req.password, user.password().clone())
            .await?;
        if !ok {
            warn!(user_id = %user.id(), "login invalid password");
            return Err(invalid_credentials());
        }
        if !user.is_active() {
            warn!(user_id = %user.id(), "login on deactivated account");
            return Err(invalid_credentials());
        }

        let token = self.keys.sign(&Principal::from(&user))?;
        info!(user_id = %user.id(), "user logged in");
        Ok((user, token))
    }

    /// Fresh expiry for a principal the access guard already resolved.
    #[instrument(skip(self, principal), fields(user_id = %principal.id))]
    pub fn refresh(&self, principal: &Principal) -> AppResult<IssuedToken> {
        Ok(self.keys.sign(principal)?)
    }
}
