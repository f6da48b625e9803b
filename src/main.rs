use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use visitor_tracker::api::{self, AppState};
use visitor_tracker::auth::AuthService;
use visitor_tracker::config::Config;
use visitor_tracker::storage;
use visitor_tracker::tracking::GeoService;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("visitor_tracker=info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let storage = storage::connect(&config.database).await?;
    info!("Initializing database...");
    storage.init().await.context("Failed to initialize database")?;
    info!("Database initialized successfully");

    // Geolocation
    let geo = Arc::new(GeoService::from_config(&config.geo)?);

    // Admin key
    let auth_service = Arc::new(AuthService::new(config.admin.key.clone()));
    if auth_service.is_configured() {
        info!("🔐 Visit log protected by admin key");
    } else {
        warn!("ADMIN_KEY is not set - /logs will reject every request");
    }

    if let Some(ref static_dir) = config.frontend.static_dir {
        info!("🎨 Serving pages from directory: {}", static_dir);
    } else {
        info!("🎨 Serving embedded pages");
    }

    let state = Arc::new(AppState {
        storage,
        geo,
        static_dir: config.frontend.static_dir.clone(),
    });
    let app = api::create_router(state, auth_service);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("🚀 Server listening on http://{}", addr);
    info!("   - Track visits at http://{}/track", addr);
    info!("   - Admin page at http://{}/admin", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
