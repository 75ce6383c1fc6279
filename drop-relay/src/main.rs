//! drop-relay binary entry point.
//!
//! Usage:
//! ```bash
//! drop-relay --config relay.toml
//! RUST_LOG=zerok_drop_relay=debug drop-relay
//! ```

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use zerok_drop_relay::cleanup::spawn_cleanup_task;
use zerok_drop_relay::config::Config;
use zerok_drop_relay::http::{build_router, health::init_start_time};
use zerok_drop_relay::server::DropRelay;
use zerok_drop_relay::storage::SqliteStorage;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config(get_config_path())?;
    init_start_time();

    let storage = SqliteStorage::new(&config.storage.database)
        .await
        .with_context(|| format!("Failed to open database {:?}", config.storage.database))?;

    let bind_address = config.http.bind_address.clone();
    let cleanup_config = config.cleanup.clone();
    let relay = Arc::new(DropRelay::new(config, storage).context("Invalid password settings")?);

    let cleanup = spawn_cleanup_task(
        relay.storage_arc(),
        relay.rate_limits().clone(),
        cleanup_config,
    );

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!(
        "drop-relay v{} listening on {}",
        env!("CARGO_PKG_VERSION"),
        listener.local_addr()?
    );
    tracing::info!(
        "Accepting upload bodies up to {} bytes",
        relay.config().storage.max_body_bytes
    );

    axum::serve(
        listener,
        build_router(relay).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server failed")?;

    cleanup.abort();
    tracing::info!("drop-relay stopped");
    Ok(())
}

fn get_config_path() -> PathBuf {
    std::env::args()
        .skip_while(|arg| arg != "--config")
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("relay.toml"))
}

/// Load the config file, or defaults when the file does not exist.
fn load_config(path: PathBuf) -> Result<Config> {
    if !path.exists() {
        tracing::info!("No config at {:?}, using defaults", path);
        return Ok(Config::default());
    }
    let config = Config::from_file(&path)
        .with_context(|| format!("Failed to load config {:?}", path))?;
    tracing::info!("Loaded config from {:?}", path);
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
