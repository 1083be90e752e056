// Medicine Inventory - Web Server
// Serves the JSON API and keeps the SQLite-backed subscriptions fresh.

use anyhow::{Context, Result};
use clap::Parser;
use medsync::api::{build_router, spawn_store_poller, AppState};
use medsync::{init_logging, Catalog, Config, ServerCli, SqliteStore};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ServerCli::parse();
    let config = Config::from_args(&cli.store);
    init_logging(&config);

    info!("Medicine Inventory - Web Server v{}", medsync::VERSION);

    // Open database
    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    info!(path = %config.db_path.display(), "database opened");

    // Subscribe to both collections
    let mut catalog = Catalog::new(Some(Arc::new(store.clone())), &config);
    catalog.start();
    let state = AppState::new(catalog);

    // Poll for writes made by other processes (imports)
    spawn_store_poller(store, config.poll_interval);

    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", cli.bind))?;

    info!("Server running on http://{}", cli.bind);
    info!("API: http://{}/api/tabs/products", cli.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}
