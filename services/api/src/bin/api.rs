//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, StorageAdapter, SupabaseAuthAdapter, SupabaseClient},
    config::Config,
    error::ApiError,
    web::{create_router, state::AppState},
};
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

    // --- 2. Initialize Backend Adapters ---
    let client = SupabaseClient::new(
        &config.supabase_url,
        &config.supabase_anon_key,
        config.request_timeout,
    )?;
    let auth_adapter = Arc::new(SupabaseAuthAdapter::new(client.clone()));
    let db_adapter = Arc::new(DbAdapter::new(client.clone()));
    let storage_adapter = Arc::new(StorageAdapter::new(client));

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        auth_adapter,
        db_adapter,
        storage_adapter,
    ));
    let auth_subscription = app_state.sync_store_with_session();

    // --- 4. Create the Web Router ---
    let app = create_router(app_state.clone());

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

    // --- 6. Release Session Resources ---
    auth_subscription.unsubscribe();
    app_state.store.shutdown();
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
