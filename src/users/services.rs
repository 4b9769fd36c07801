use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::password::CredentialManager;
use crate::config::BootstrapAdmin;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::users::dto::{CreateUserRequest, UpdateUserRequest};
use crate::users::model::{normalize_email, NewUser, Password, ProfileChanges, Role, User};
use crate::users::repo::UserRepository;

/// User use-cases. Each one validates fully before its first write.
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    creds: Arc<CredentialManager>,
}

impl FromRef<AppState> for UserService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), state.credentials.clone())
    }
}

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".into())
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>, creds: Arc<CredentialManager>) -> Self {
        Self { repo, creds }
    }

    /// The existence check is advisory; the `users_email_key` constraint
    /// settles concurrent registrations and surfaces as a conflict too.
    #[instrument(skip(self, input))]
    pub async fn create_user(&self, input: CreateUserRequest) -> AppResult<User> {
        let email = normalize_email(&input.email);
        if self.repo.exists_by_email(&email).await? {
            warn!(email = %email, "email already registered");
            return Err(AppError::Conflict("Email already registered".into()));
        }

        let password = Password::parse(&input.password)?;
        let hashed = self.creds.hash_blocking(password).await?;
        let user = User::create(NewUser {
            name: input.name,
            email,
            password: hashed,
            avatar: input.avatar,
            role: input.role,
        })?;

        let saved = self.repo.save(&user).await?;
        info!(user_id = %saved.id(), role = %saved.role(), "user created");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.active_user(id).await
    }

    /// Active users, newest first, with the total active count.
    #[instrument(skip(self))]
    pub async fn list_users(&self, role: Option<Role>) -> AppResult<(Vec<User>, i64)> {
        let users = match role {
            Some(role) => self.repo.find_by_role(role).await?,
            None => self.repo.find_all_active().await?,
        };
        let total = self.repo.count().await?;
        Ok((users, total))
    }

    #[instrument(skip(self, input))]
    pub async fn update_user(&self, id: Uuid, input: UpdateUserRequest) -> AppResult<User> {
        let current = self.active_user(id).await?;

        let password = input.password.as_deref().map(Password::parse).transpose()?;
        let changes = ProfileChanges {
            name: input.name,
            avatar: input.avatar,
            role: input.role,
            email: input.email,
        };

        let mut next = if changes.is_empty() {
            current
        } else {
            current.update_profile(changes)?
        };
        if let Some(password) = password {
            next = next.change_password(self.creds.hash_blocking(password).await?);
        }

        // a delete that lands after our read wins; the edit is dropped
        let saved = self
            .repo
            .update_active(&next)
            .await?
            .ok_or_else(user_not_found)?;
        info!(user_id = %saved.id(), "user updated");
        Ok(saved)
    }

    /// Soft delete. A second delete of the same user is a conflict.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: Uuid) -> AppResult<User> {
        let user = self.repo.find_by_id(id).await?.ok_or_else(user_not_found)?;
        if !user.is_active() {
            return Err(AppError::Conflict("User is already deactivated".into()));
        }
        let saved = self.repo.save(&user.deactivate()).await?;
        info!(user_id = %id, "user deactivated");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn reactivate_user(&self, id: Uuid) -> AppResult<User> {
        let user = self.repo.find_by_id(id).await?.ok_or_else(user_not_found)?;
        if user.is_active() {
            return Err(AppError::Conflict("User is already active".into()));
        }
        let saved = self.repo.save(&user.activate()).await?;
        info!(user_id = %id, "user reactivated");
        Ok(saved)
    }

    /// Points the avatar at an already stored object.
    #[instrument(skip(self))]
    pub async fn set_avatar(&self, id: Uuid, url: String) -> AppResult<User> {
        self.active_user(id).await?;
        let changes = ProfileChanges {
            avatar: Some(url),
            ..Default::default()
        };
        self.repo
            .update(id, changes)
            .await?
            .ok_or_else(user_not_found)
    }

    /// Creates the configured admin unless that email is already taken.
    #[instrument(skip(self, admin), fields(email = %admin.email))]
    pub async fn ensure_admin(&self, admin: &BootstrapAdmin) -> AppResult<()> {
        if self.repo.exists_by_email(&normalize_email(&admin.email)).await? {
            info!("bootstrap admin already present");
            return Ok(());
        }
        self.create_user(CreateUserRequest {
            name: admin.name.clone(),
            email: admin.email.clone(),
            password: admin.password.clone(),
            avatar: None,
            role: Role::Admin,
        })
        .await?;
        Ok(())
    }

    async fn active_user(&self, id: Uuid) -> AppResult<User> {
        match self.repo.find_by_id(id).await? {
            Some(user) if user.is_active() => Ok(user),
            _ => Err(user_not_found()),
        }
    }
}
