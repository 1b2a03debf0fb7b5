//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, MemoryStore, PlaceholderReplyAdapter},
    config::Config,
    error::ApiError,
    web::{router, state::AppState},
};
use chatbot_builder_core::ports::{AccountStore, Datastore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to the Datastore ---
    let (store, accounts) = connect_stores(&config).await?;

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        store,
        accounts,
        Arc::new(PlaceholderReplyAdapter::new()),
    ));

    // --- 4. Create the Web Router ---
    let app = router(app_state)?;

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Picks the in-process store for `DATABASE_URL=memory`, PostgreSQL otherwise.
async fn connect_stores(
    config: &Config,
) -> Result<(Arc<dyn Datastore>, Arc<dyn AccountStore>), ApiError> {
    if config.uses_memory_store() {
        warn!("DATABASE_URL=memory: using the in-process datastore, nothing will be persisted");
        let memory = Arc::new(MemoryStore::new());
        let store: Arc<dyn Datastore> = memory.clone();
        let accounts: Arc<dyn AccountStore> = memory;
        return Ok((store, accounts));
    }

    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");
    let store: Arc<dyn Datastore> = db_adapter.clone();
    let accounts: Arc<dyn AccountStore> = db_adapter;
    Ok((store, accounts))
}
