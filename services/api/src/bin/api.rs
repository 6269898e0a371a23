//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, JwtTokenAdapter, Store},
    config::Config,
    engine::SessionEngine,
    error::ApiError,
    web::{build_router, state::AppState},
};
use std::sync::Arc;
use tracing::info;
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

    // --- 2. Open the Store ---
    info!(path = %config.database_path.display(), "Opening database...");
    let store = Arc::new(Store::open(&config.database_path).await?);
    let db_adapter = Arc::new(DbAdapter::new(store.clone()));
    info!("Database ready.");

    // --- 3. Build the Engine and Token Service ---
    let engine = Arc::new(SessionEngine::new(
        db_adapter.clone(),
        config.public_base_url.clone(),
        config.duration_unit,
    ));
    let resumed = engine.resume_active_sessions().await?;
    info!("Resumed {} active sessions.", resumed);

    let tokens = Arc::new(JwtTokenAdapter::new(config.jwt_secret.clone()));

    // --- 4. Build the Shared AppState and Router ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        tokens,
        engine: engine.clone(),
        config: config.clone(),
    });
    let app = build_router(app_state)?;

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- 6. Tear Down ---
    info!("Server stopped. Stopping session workers...");
    engine.shutdown().await;
    store.shutdown().await;
    info!("Shutdown complete.");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
