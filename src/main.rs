use std::error::Error;

use tracing_subscriber::EnvFilter;

use historial::api::{self, ApiContext};
use historial::config;
use historial::db;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let db_path = config::database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // Run migrations once at startup; request handlers open their own
    // connections against the migrated file.
    db::sqlite::open_database(&db_path)?;

    let uploads_dir = config::uploads_dir();
    std::fs::create_dir_all(&uploads_dir)?;

    let ctx = ApiContext::new(db_path, uploads_dir, config::JwtSettings::from_env());
    let mut server = api::start_server(ctx, config::bind_addr()).await?;
    tracing::info!(addr = %server.addr, "API server listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    server.shutdown();

    Ok(())
}
