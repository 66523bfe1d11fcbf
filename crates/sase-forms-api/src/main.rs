//! OpenSASE Form Builder API - Main Entry Point

use sase_forms::infrastructure::persistence::InMemoryFormStore;
use sase_forms_api::{build_router, config::DEFAULT_JWT_SECRET, AppState, ServerConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("OpenSASE Forms API v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    if config.auth.jwt_secret == DEFAULT_JWT_SECRET {
        tracing::warn!("Using the built-in JWT secret; set FORMS_JWT_SECRET");
    }

    let store = Arc::new(InMemoryFormStore::new());
    let addr = config.bind_addr.clone();
    let app = build_router(Arc::new(AppState::new(config, store)));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Forms API listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
