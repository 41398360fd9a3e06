use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use smart_office_api::app::{router, AppState};
use smart_office_api::config::{AppConfig, StorageBackend};
use smart_office_api::is_production;

/// Multi-tenant office, room and telemetry API server
#[derive(Parser, Debug)]
#[command(name = "smart-office-api", version, about)]
struct Args {
    /// Port to listen on (overrides SMART_OFFICE_PORT / PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Storage backend (overrides STORAGE_BACKEND)
    #[arg(long, value_enum)]
    storage: Option<StorageBackend>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, IDENTITY_TOKEN_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config: AppConfig = smart_office_api::config::config().clone();
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(storage) = args.storage {
        config.storage.backend = storage;
    }
    tracing::info!("Starting Smart Office API in {:?} mode", config.environment);

    if is_production!() && config.identity.token_secret.is_empty() {
        anyhow::bail!("IDENTITY_TOKEN_SECRET must be set in production");
    }

    let state = AppState::from_config(&config)
        .await
        .context("failed to initialise application state")?;

    let bind_addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Smart Office API listening on http://{}", bind_addr);
    axum::serve(listener, router(state)).await.context("server error")?;
    Ok(())
}
