mod config;
mod db;
mod error;
mod handlers;
mod models;
mod store;
mod voting;

use config::{Config, StorageBackend};
use db::{MemoryStorage, PollStorage, SqliteStorage};
use log::{error, info, warn};
use std::sync::Arc;
use store::PollStore;

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let storage: Arc<dyn PollStorage> = match &config.storage {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; polls are lost on restart");
            Arc::new(MemoryStorage::new())
        }
        StorageBackend::Sqlite { url, max_connections } => {
            match SqliteStorage::connect(url, *max_connections).await {
                Ok(db) => Arc::new(db),
                Err(e) => {
                    error!("Failed to initialize database: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    let store = Arc::new(PollStore::new(storage));
    let app = handlers::router(store);

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };
    info!("Listening on http://{}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
    info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
