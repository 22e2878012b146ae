//! Mailcast - Campaign server entry point

use anyhow::Result;
use mailcast_api::{create_router, AppState};
use mailcast_common::config::{Config, LoggingConfig};
use mailcast_core::{CampaignController, SettingsStore, SmtpTransport};
use mailcast_storage::repository::{
    DbSettingsRepository, MemorySettingsRepository, SettingsRepository,
};
use mailcast_storage::DatabasePool;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration, from the file given as first argument if any
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(Path::new(&path))?,
        None => Config::load()?,
    };

    init_logging(&config.logging);

    info!("Starting Mailcast...");

    // Initialize persistence
    let (repository, db_pool): (Arc<dyn SettingsRepository>, Option<DatabasePool>) =
        if config.database.is_memory() {
            info!("Using in-memory settings store, data is lost on exit");
            (Arc::new(MemorySettingsRepository::new()), None)
        } else {
            let db_pool = DatabasePool::connect(&config.database).await?;
            db_pool.migrate().await?;
            (
                Arc::new(DbSettingsRepository::new(db_pool.clone())),
                Some(db_pool),
            )
        };

    // Load settings and build the campaign controller
    let store = Arc::new(SettingsStore::load(repository).await?);
    let controller = Arc::new(CampaignController::new(
        store,
        Arc::new(SmtpTransport::new()),
    ));

    let state = Arc::new(AppState::new(controller, db_pool));
    let app = create_router(state, &config.api);

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Starting API server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Mailcast shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},mailcast=debug", config.level)));

    if config.format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true).with_level(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter)
            .init();
    }
}
