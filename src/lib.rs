pub mod chat_api;
pub mod completion;
pub mod config;
pub mod context_cache;
pub mod error;
pub mod webhook;

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use log::info;
use tower_http::cors::CorsLayer;

use config::Config;
use error::{BotError, Result};

pub async fn run() -> Result<()> {
    let config = Config::from_env()?;

    let state = Arc::new(webhook::AppState::from_config(&config)?);
    let mut app = webhook::router(state);
    if let Some(origin) = &config.cors_origin {
        app = app.layer(cors_layer(origin)?);
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let origin = origin
        .parse::<HeaderValue>()
        .map_err(|e| BotError::Config(format!("Invalid CORS_ORIGIN: {e}")))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST]))
}
