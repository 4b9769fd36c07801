use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::{jwt::JwtKeys, password::CredentialManager};
use crate::config::AppConfig;
use crate::likes::repo::{LikeRepository, PgLikeRepository};
use crate::storage::{Storage, StorageClient};
use crate::users::repo::{PgUserRepository, UserRepository};

/// Shared, cheaply cloneable handles. No per-request mutable state lives here.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub likes: Arc<dyn LikeRepository>,
    pub storage: Arc<dyn StorageClient>,
    pub credentials: Arc<CredentialManager>,
    pub keys: JwtKeys,
}

impl AppState {
    pub async fn init(config: &AppConfig, db: PgPool) -> anyhow::Result<Self> {
        let storage = Arc::new(Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;
        let credentials = Arc::new(CredentialManager::new(&config.hash)?);

        Ok(Self::from_parts(
            Arc::new(PgUserRepository::new(db.clone())),
            Arc::new(PgLikeRepository::new(db)),
            storage,
            credentials,
            JwtKeys::from_config(&config.jwt),
        ))
    }

    pub fn from_parts(
        users: Arc<dyn UserRepository>,
        likes: Arc<dyn LikeRepository>,
        storage: Arc<dyn StorageClient>,
        credentials: Arc<CredentialManager>,
        keys: JwtKeys,
    ) -> Self {
        Self {
            users,
            likes,
            storage,
            credentials,
            keys,
        }
    }

    /// In-memory adapters, an in-memory bucket and cheap hashing.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::JwtConfig;
        use crate::likes::memory::InMemoryLikeRepository;
        use crate::storage::MemoryStorage;
        use crate::users::memory::InMemoryUserRepository;

        Self::from_parts(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryLikeRepository::new()),
            Arc::new(MemoryStorage::default()),
            Arc::new(crate::auth::password::cheap_manager()),
            JwtKeys::from_config(&JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            }),
        )
    }
}
