//! services/tracker/src/bin/tracker.rs
//!
//! The tracking HTTP server.

use phishing_core::ports::{PoolStore, TargetStore};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracker_lib::{
    adapters::{MemoryStore, PgStore},
    config::Config,
    error::ApiError,
    web::{self, pages::Pages, AppState},
};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Storage & Run Migrations ---
    let (targets, pools): (Arc<dyn TargetStore>, Arc<dyn PoolStore>) = match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            let store = Arc::new(PgStore::connect(url, config.database_max_connections).await?);
            info!("Running database migrations...");
            store.run_migrations().await?;
            info!("Database migrations complete.");
            (store.clone() as Arc<dyn TargetStore>, store as Arc<dyn PoolStore>)
        }
        None => {
            warn!("DATABASE_URL is not set, results are kept in memory and lost on exit");
            let store = Arc::new(MemoryStore::new());
            (store.clone() as Arc<dyn TargetStore>, store as Arc<dyn PoolStore>)
        }
    };

    // --- 3. Load Response Pages ---
    let pages = Arc::new(Pages::load(&config.pages_path)?);

    // --- 4. Build the Shared AppState & Router ---
    let app_state = Arc::new(AppState {
        targets,
        pools,
        pages,
    });
    let app = web::router(app_state);

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
