use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::HashConfig;
use crate::users::model::{HashedPassword, Password};

/// One-way salted password hashing (Argon2id) with the configured cost.
#[derive(Clone)]
pub struct CredentialManager {
    argon2: Argon2<'static>,
    // Verified against when the account is unknown, so a miss costs the same
    // time as a wrong password.
    dummy_hash: HashedPassword,
}

impl CredentialManager {
    pub fn new(cfg: &HashConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 params: {}", e))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, "Dummy#Secret1")?;
        Ok(Self { argon2, dummy_hash })
    }

    pub fn hash(&self, password: &Password) -> anyhow::Result<HashedPassword> {
        hash_with(&self.argon2, password.expose())
    }

    pub fn verify(&self, plain: &str, hash: &HashedPassword) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(hash.as_str()).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(self
            .argon2
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    pub fn verify_dummy(&self, plain: &str) {
        let _ = self.verify(plain, &self.dummy_hash);
    }

    // Argon2 is CPU bound; request handlers go through these so the
    // runtime's worker threads are never held by a hash computation.

    pub async fn hash_blocking(&self, password: Password) -> anyhow::Result<HashedPassword> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.hash(&password))
            .await
            .context("password hashing task")?
    }

    pub async fn verify_blocking(
        &self,
        plain: String,
        hash: HashedPassword,
    ) -> anyhow::Result<bool> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.verify(&plain, &hash))
            .await
            .context("password verification task")?
    }

    pub async fn verify_dummy_blocking(&self, plain: String) {
        let this = self.clone();
        let _ = tokio::task::spawn_blocking(move || this.verify_dummy(&plain)).await;
    }
}

fn hash_with(argon2: &Argon2<'static>, plain: &str) -> anyhow::Result<HashedPassword> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(HashedPassword::from_stored(hash))
}

#[cfg(test)]
pub(crate) fn cheap_manager() -> CredentialManager {
    CredentialManager::new(&HashConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .expect("cheap params are valid")
}
