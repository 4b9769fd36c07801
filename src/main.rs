mod app;
mod auth;
mod config;
mod db;
mod error;
mod likes;
mod state;
mod storage;
mod users;

use axum::extract::FromRef;

use crate::config::AppConfig;
use crate::state::AppState;
use crate::users::services::UserService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "toctoc=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let addr = config.server.addr()?;
    let pool = db::connect(&config.db).await?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }

    let app_state = AppState::init(&config, pool).await?;

    if let Some(admin) = &config.bootstrap_admin {
        if let Err(e) = UserService::from_ref(&app_state).ensure_admin(admin).await {
            tracing::error!(error = %e, "bootstrap admin could not be created");
        }
    }

    app::serve(app::build_app(app_state), addr).await
}
