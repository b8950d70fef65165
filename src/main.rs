use anyhow::Result;

use tecnicoya_backend::{app, auth::TokenService, config, db, logging, services};

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
        "Starting TécnicoYa backend"
    );

    // Create database pool and run migrations
    let pool = db::create_pool(&settings).await?;

    // Token service
    let tokens = TokenService::new(&settings.jwt_secret, settings.token_ttl_days);

    // Realtime event hub
    let hub = services::EventHub::new();

    // Image store client
    let image_store = services::ImageStoreClient::new(
        &settings.image_store_url,
        &settings.image_store_key,
        settings.image_store_timeout_seconds,
    )?;

    // Create application state
    let state = app::AppState::new(pool, settings.clone(), tokens, hub, image_store);

    // Build application
    let app = app::create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
