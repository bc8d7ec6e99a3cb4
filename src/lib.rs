pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

// Export all model types
pub use model::*;

pub use error::{StoreError, StoreResult};

// Export store types
pub use store::{InstanceStore, MemoryStore, PostgresStore, Store};

use crate::config::{AppConfig, Backend};
use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Initialize logging; `RUST_LOG` refines the defaults.
pub fn init_logging() {
    use env_logger::Builder;
    use log::LevelFilter;

    let initialized = Builder::new()
        .filter_level(LevelFilter::Info) // Default to Info for everything
        .filter_module("sqlx", LevelFilter::Warn) // Suppress sqlx statement logs
        .parse_env("RUST_LOG")
        .try_init();
    if let Err(e) = initialized {
        eprintln!("logging not initialized: {}", e);
    }
}

/// Connect the configured store and serve until Ctrl-C.
///
/// A database that cannot be reached at startup is fatal: the error is
/// returned before the listener is bound.
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    match config.db.backend {
        Backend::Postgres => {
            let location = config.db.display_location();
            log::info!("Connecting to PostgreSQL at {}...", location);

            let options = config
                .db
                .connect_options()
                .context("Invalid database connection settings")?;
            let store = PostgresStore::new(options, config.db.max_connections)
                .await
                .with_context(|| format!("unable to connect to database at {}", location))?;
            store
                .migrate()
                .await
                .context("Failed to prepare the instances table")?;

            let name = store.database_name().await?;
            log::info!(
                "Connection to {} database at {} established.",
                name,
                location
            );

            let hosting = if config.db.is_local() { "locally" } else { "remotely" };
            serve(Arc::new(store), &config, hosting).await
        }
        Backend::Memory => {
            log::warn!("Using the in-memory store; instances are lost on exit");
            serve(Arc::new(MemoryStore::new()), &config, "in-memory").await
        }
    }
}

async fn serve<S: Store + 'static>(
    store: Arc<S>,
    config: &AppConfig,
    hosting: &str,
) -> anyhow::Result<()> {
    let app = api::routes::create_app(store, config.environment, &config.server.static_dir);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    log::info!(
        "Room Editor {} server {} listening at port {} with {} hosted database.",
        config.environment.as_str(),
        api::site::VERSION,
        listener.local_addr()?.port(),
        hosting
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
