//! Webhook dispatch and the HTTP surface of the relay.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde::Serialize;
use serde_json::{Value, json};

use crate::chat_api::{ChatClient, TokenProvider};
use crate::completion::{APOLOGY_MESSAGE, CompletionClient, Notification};
use crate::config::Config;
use crate::context_cache::ContextCache;
use crate::error::{BotError, Result};

/// Shared state behind the webhook routes.
pub struct AppState {
    pub completion: CompletionClient,
    pub chat: Arc<ChatClient>,
    pub cache: Arc<ContextCache>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::new();
        let tokens = TokenProvider::new(
            http.clone(),
            config.zoom_oauth_base_url.clone(),
            config.zoom_client_id.clone(),
            config.zoom_client_secret.clone(),
        );
        let chat = Arc::new(ChatClient::new(
            http,
            config.zoom_base_url.clone(),
            config.zoom_bot_jid.clone(),
            tokens,
        ));
        let cache = Arc::new(ContextCache::new(config.max_recipients));
        let completion = CompletionClient::new(
            config.anthropic_base_url.clone(),
            config.anthropic_api_key.clone(),
            config.anthropic_model.clone(),
            cache.clone(),
            chat.clone(),
        )?;
        Ok(Self {
            completion,
            chat,
            cache,
        })
    }
}

/// Inbound event kinds, with an explicit arm for everything unrecognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEvent {
    BotNotification,
    BotInstalled,
    AppDeauthorized,
    UrlValidation,
    Unsupported,
}

impl WebhookEvent {
    pub fn classify(event: &str) -> Self {
        match event {
            "bot_notification" => Self::BotNotification,
            "bot_installed" => Self::BotInstalled,
            "app_deauthorized" => Self::AppDeauthorized,
            "endpoint.url_validation" => Self::UrlValidation,
            _ => Self::Unsupported,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhooks", post(handle_webhook))
        .route("/webhooks/health", get(health))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        service: "zoombot",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn handle_webhook(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Response {
    match dispatch(&state, &body).await {
        Ok(response) => response,
        Err(e) => {
            error!("Webhook dispatch failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Internal server error" })),
            )
                .into_response()
        }
    }
}

async fn dispatch(state: &AppState, body: &Value) -> Result<Response> {
    let Some(event) = body.get("event").and_then(Value::as_str) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "Missing or invalid event field" })),
        )
            .into_response());
    };
    let payload = body.get("payload").cloned().unwrap_or(Value::Null);

    match WebhookEvent::classify(event) {
        WebhookEvent::BotNotification => {
            let note: Notification = serde_json::from_value(payload)
                .map_err(|e| BotError::Validation(e.to_string()))?;
            info!(
                "bot_notification from {} ({})",
                note.user_jid,
                note.user_name.as_deref().unwrap_or("unknown")
            );
            if let Err(e) = state.completion.complete(&note).await {
                error!("Completion failed for {}: {e}", note.to_jid);
                send_apology(state, &note).await;
            }
            Ok(success_envelope(event))
        }
        WebhookEvent::BotInstalled => {
            info!("Bot installed");
            Ok(success_envelope(event))
        }
        WebhookEvent::AppDeauthorized => {
            info!("App deauthorized");
            Ok(success_envelope(event))
        }
        WebhookEvent::UrlValidation => {
            let plain_token = payload
                .get("plainToken")
                .and_then(Value::as_str)
                .unwrap_or_default();
            // Exact envelope shape required by Zoom's endpoint verification
            Ok(Json(json!({ "message": { "plainToken": plain_token } })).into_response())
        }
        WebhookEvent::Unsupported => {
            warn!("Unsupported webhook event: {event}");
            Ok(success_envelope(event))
        }
    }
}

fn success_envelope(event: &str) -> Response {
    Json(json!({
        "success": true,
        "message": "Event processed successfully",
        "event": event,
    }))
    .into_response()
}

/// Completion failures never surface to the webhook caller; the recipient
/// gets a fixed apology instead, and a failed apology send is only logged.
async fn send_apology(state: &AppState, note: &Notification) {
    if note.to_jid.is_empty() {
        return;
    }
    if let Err(e) = state
        .chat
        .send_message(&note.to_jid, &note.account_id, APOLOGY_MESSAGE, None)
        .await
    {
        warn!("Failed to send apology to {}: {e}", note.to_jid);
    }
}
