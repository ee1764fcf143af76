mod api;
mod app;
mod auth;
mod config;
mod db;
mod domain;
mod error;
mod logging;
mod middleware;
mod routes;
mod services;

use anyhow::Result;

use services::{RecognitionClient, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = config::Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting SiteControl backend"
    );

    // Create database pool and bring the schema up to date
    let pool = db::create_pool(&settings).await?;
    db::run_migrations(&pool).await?;

    // Create object storage client
    let storage = Storage::new(&settings).await?;

    // Create delivery-note recognition client
    let recognition = RecognitionClient::new(
        &settings.recognition_service_url,
        &settings.recognition_service_token,
        settings.recognition_timeout_seconds,
    )?;

    // Optionally check recognition service health (non-blocking)
    tokio::spawn({
        let recognition = recognition.clone();
        async move {
            match recognition.health_check().await {
                Ok(()) => tracing::info!("Recognition service is healthy"),
                Err(e) => tracing::warn!(error = %e, "Recognition service health check failed - will retry on first request"),
            }
        }
    });

    // Create application state
    let state = app::AppState::new(pool, settings.clone(), storage, recognition);

    // Build application
    let app = app::create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
