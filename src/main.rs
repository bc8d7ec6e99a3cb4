use room_editor_sync::config::AppConfig;
use room_editor_sync::{init_logging, run_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    init_logging();

    let config = AppConfig::load()?;
    log::info!(
        "Configuration loaded: environment={} server={} database={}",
        config.environment.as_str(),
        config.server_address(),
        config.db.display_location()
    );

    if let Err(e) = run_server(config).await {
        log::error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
