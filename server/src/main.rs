//! JobQuest server - HTTP entry point for the engagement engine

mod config;
mod routes;
mod state;

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobquest_server=debug,jobquest_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting JobQuest server");

    let config = ServerConfig::from_env()?;
    let state = AppState::init(&config).await?;

    spawn_sweeper(state.clone(), Duration::from_secs(config.sweep_interval_secs));

    let app = routes::build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("Listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

/// Periodically evict idle assessment sessions and stale rate-limit entries
fn spawn_sweeper(state: AppState, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match state.chat.sweep(Utc::now()).await {
                Ok(0) => {}
                Ok(removed) => debug!("Swept {} expired chat entries", removed),
                Err(e) => error!("Session sweep failed: {}", e),
            }
        }
    });
}
