use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod db;
mod domain;
mod rest;

use crate::auth::AuthService;
use crate::config::ServerConfig;
use crate::db::DbConnection;
use crate::domain::{BudgetService, CalendarService};
use crate::rest::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG wins; info otherwise
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::load()?;

    info!("Setting up database at {}", config.database_url);
    let db = DbConnection::new(&config.database_url).await?;

    info!("Setting up application state");
    let calendar_service = CalendarService::new();
    let state = AppState::new(
        BudgetService::new(Arc::new(db), calendar_service.clone()),
        calendar_service,
        AuthService::new(&config.users, config.session_ttl()),
    );

    let app = create_router(state, &config);

    info!("Serving static files from {}", config.static_dir.display());
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("Listening on {}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
