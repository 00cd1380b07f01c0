use std::env;

use log::{debug, error, info};

use crate::error::Result;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_ZOOM_BASE_URL: &str = "https://api.zoom.us";
const DEFAULT_ZOOM_OAUTH_BASE_URL: &str = "https://zoom.us";
const DEFAULT_MAX_RECIPIENTS: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub anthropic_base_url: String,
    pub zoom_client_id: String,
    pub zoom_client_secret: String,
    pub zoom_bot_jid: String,
    pub zoom_base_url: String,
    pub zoom_oauth_base_url: String,
    pub cors_origin: Option<String>,
    pub max_recipients: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        debug!("Loading configuration from environment");
        dotenvy::dotenv().ok();

        let anthropic_api_key = required("ANTHROPIC_API_KEY")?;
        let anthropic_model = required("ANTHROPIC_MODEL")?;
        let zoom_client_id = required("ZOOM_CLIENT_ID")?;
        let zoom_client_secret = required("ZOOM_CLIENT_SECRET")?;
        let zoom_bot_jid = required("ZOOM_BOT_JID")?;

        let port = env::var("PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let anthropic_base_url =
            env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_ANTHROPIC_BASE_URL.into());
        let zoom_base_url =
            env::var("ZOOM_BASE_URL").unwrap_or_else(|_| DEFAULT_ZOOM_BASE_URL.into());
        let zoom_oauth_base_url =
            env::var("ZOOM_OAUTH_BASE_URL").unwrap_or_else(|_| DEFAULT_ZOOM_OAUTH_BASE_URL.into());
        let cors_origin = env::var("CORS_ORIGIN").ok();
        let max_recipients = env::var("MAX_RECIPIENTS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_MAX_RECIPIENTS);

        info!("Configuration loaded successfully");
        debug!("Anthropic model: {anthropic_model}");
        debug!(
            "Anthropic API key length: {} characters",
            anthropic_api_key.len()
        );
        debug!("Zoom bot JID: {zoom_bot_jid}");
        debug!("Listening port: {port}");

        Ok(Self {
            port,
            anthropic_api_key,
            anthropic_model,
            anthropic_base_url,
            zoom_client_id,
            zoom_client_secret,
            zoom_bot_jid,
            zoom_base_url,
            zoom_oauth_base_url,
            cors_origin,
            max_recipients,
        })
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|e| {
        error!("Failed to load {name} from environment: {e}");
        e.into()
    })
}
