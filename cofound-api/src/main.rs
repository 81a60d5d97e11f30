//! # Cofound API Server
//!
//! Serves the startup directory, profiles, magic-link sign-in and the
//! participation request workflow.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/cofound JWT_SECRET=... cargo run -p cofound-api
//! ```
//!
//! Set `LOG_FORMAT=json` for structured logs.

use std::time::Duration;

use anyhow::Context;
use cofound_api::{
    app::{build_router, AppState},
    config::Config,
};
use cofound_shared::db::{
    migrations::{ensure_database_exists, run_migrations},
    pool::{close_pool, create_pool, DatabaseConfig},
};
use cofound_shared::models::verification_token::VerificationToken;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TOKEN_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cofound_api=debug,cofound_shared=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Deletes expired sign-in tokens periodically
fn spawn_token_purge(pool: PgPool) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TOKEN_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match VerificationToken::purge_expired(&pool).await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "Purged expired sign-in tokens"),
                Err(e) => tracing::warn!(error = %e, "Failed to purge expired sign-in tokens"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Cofound API Server v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Failed to load configuration")?;

    if !config.api.production {
        ensure_database_exists(&config.database.url)
            .await
            .context("Failed to create database")?;
    }

    let pool = create_pool(DatabaseConfig {
        max_connections: config.database.max_connections,
        ..DatabaseConfig::from_url(config.database.url.clone())
    })
    .await
    .context("Failed to connect to database")?;

    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    spawn_token_purge(pool.clone());

    let address = config.bind_address();
    let state = AppState::from_config(pool.clone(), config).context("Failed to set up email")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}
