use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

use crate::config::DbConfig;
use crate::error::ValidationError;

const UNIQUE_VIOLATION: &str = "23505";

/// Failure surfaced by a persistence adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("rejected by domain rules: {0}")]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let constraint = db_err.constraint().unwrap_or("unique constraint").to_string();
                return StoreError::UniqueViolation(constraint);
            }
        }
        StoreError::Other(anyhow::Error::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub async fn connect(cfg: &DbConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(cfg.min_connections)
        .max_connections(cfg.max_connections)
        .idle_timeout(cfg.idle_timeout())
        .acquire_timeout(cfg.acquire_timeout())
        .connect(&cfg.url)
        .await
        .context("connect to database")?;
    tracing::info!(
        min = cfg.min_connections,
        max = cfg.max_connections,
        "database pool ready"
    );
    Ok(pool)
}
