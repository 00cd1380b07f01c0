//! Zoom Team Chat REST client and chatbot token provider.

use std::time::{Duration, Instant};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{BotError, Result};

const CHATBOT_MESSAGES_PATH: &str = "/v2/im/chat/messages/to_bot";
const TOKEN_REFRESH_MARGIN_SECS: u64 = 300;

/// Options for fetching a recipient's recent messages.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GetMessagesOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Fetches and caches a chatbot access token via Zoom's client-credentials
/// grant, refreshing ahead of expiry.
#[derive(Debug)]
pub struct TokenProvider {
    client: reqwest::Client,
    oauth_base_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(
        client: reqwest::Client,
        oauth_base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            oauth_base_url: oauth_base_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid bearer token, reusing the cached one while it has
    /// more than the refresh margin left.
    pub async fn bearer_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > Instant::now()
        {
            return Ok(token.token.clone());
        }

        debug!("Requesting new chatbot access token");
        let url = format!("{}/oauth/token", self.oauth_base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .query(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response: {e}"));
            return Err(BotError::Remote { status, message });
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = token
            .expires_in
            .saturating_sub(TOKEN_REFRESH_MARGIN_SECS)
            .max(1);
        let bearer = token.access_token.clone();
        *cached = Some(CachedToken {
            token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        });
        info!("Obtained chatbot access token (expires in {lifetime}s)");
        Ok(bearer)
    }
}

/// Client for sending and fetching Zoom Team Chat messages.
#[derive(Debug)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    bot_jid: String,
    tokens: TokenProvider,
}

impl ChatClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        bot_jid: impl Into<String>,
        tokens: TokenProvider,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            bot_jid: bot_jid.into(),
            tokens,
        }
    }

    /// Posts a chatbot message to a recipient, optionally threading it onto
    /// an earlier message.
    pub async fn send_message(
        &self,
        to_jid: &str,
        account_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<serde_json::Value> {
        let token = self.tokens.bearer_token().await?;
        let url = format!("{}{CHATBOT_MESSAGES_PATH}", self.base_url);

        let mut body = serde_json::json!({
            "robot_jid": self.bot_jid,
            "to_jid": to_jid,
            "account_id": account_id,
            "content": { "head": { "text": text } },
        });
        if let Some(reply_to) = reply_to {
            body["reply_to"] = serde_json::Value::String(reply_to.to_string());
        }

        debug!("Sending chat message to {to_jid}");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;

        Self::into_json(response).await
    }

    /// Fetches a recipient's recent messages.
    pub async fn get_messages(
        &self,
        recipient: &str,
        options: &GetMessagesOptions,
    ) -> Result<serde_json::Value> {
        let token = self.tokens.bearer_token().await?;
        let url = format!("{}/v2/chat/users/{recipient}/messages", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(options)
            .send()
            .await?;

        Self::into_json(response).await
    }

    async fn into_json(response: reqwest::Response) -> Result<serde_json::Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("Failed to read response body: {e}"));
        if !status.is_success() {
            return Err(BotError::Remote {
                status,
                message: body,
            });
        }
        if body.trim().is_empty() {
            // Zoom answers some chatbot calls with an empty 2xx body
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}
