//! Completion client bridging chat notifications to the Anthropic Messages API.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::chat_api::ChatClient;
use crate::context_cache::{ContextCache, Turn};
use crate::error::{BotError, Result};

const MESSAGES_PATH: &str = "/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const API_KEY_PREFIX: &str = "sk-ant-";

/// Model used for the single retry when the configured model is unavailable.
pub const FALLBACK_MODEL: &str = "claude-3-5-haiku-20241022";

// Zoom chat messages are short; cap replies accordingly
const MAX_TOKENS: u32 = 1024;
const TEMPERATURE: f32 = 0.7;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_PROMPT: &str = "You are a helpful assistant replying inside a Zoom Team Chat \
conversation. Keep answers concise and in plain text.";

/// Best-effort message delivered to the recipient when the completion path fails.
pub const APOLOGY_MESSAGE: &str =
    "Sorry, I couldn't generate a response right now. Please try again in a moment.";

/// Parsed payload of a `bot_notification` webhook event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub to_jid: String,
    #[serde(default)]
    pub user_jid: String,
    pub user_name: Option<String>,
    /// Text the user typed at the bot.
    #[serde(default)]
    pub cmd: String,
    /// Identifier of the triggering message, threaded onto the reply.
    #[serde(rename = "messageId")]
    pub reply_to: Option<String>,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: &'a [Turn],
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Newline-joins the text blocks of a completion response.
fn collect_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    cache: Arc<ContextCache>,
    chat: Arc<ChatClient>,
}

impl CompletionClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        cache: Arc<ContextCache>,
        chat: Arc<ChatClient>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            cache,
            chat,
        })
    }

    /// Generates a reply for the notification and delivers it to the
    /// recipient's chat.
    ///
    /// The user turn is recorded before the completion call; the assistant
    /// turn only after a successful one, so a failed call leaves the user
    /// turn as the newest history entry.
    pub async fn complete(&self, note: &Notification) -> Result<()> {
        if note.to_jid.is_empty() {
            warn!("Notification has no recipient JID, skipping completion");
            return Ok(());
        }
        if !self.api_key.starts_with(API_KEY_PREFIX) {
            return Err(BotError::Config(format!(
                "Anthropic API key missing or malformed (expected {API_KEY_PREFIX}* prefix)"
            )));
        }

        self.cache.append_user_turn(&note.to_jid, note.cmd.clone());
        let messages = self.cache.get(&note.to_jid);
        debug!(
            "Requesting completion for {} with {} history turns",
            note.to_jid,
            messages.len()
        );

        let text = match self.request_completion(&self.model, &messages).await {
            Ok(text) => text,
            Err(e) if e.is_model_not_found() && self.model != FALLBACK_MODEL => {
                warn!(
                    "Model {} not found, retrying once with fallback {FALLBACK_MODEL}",
                    self.model
                );
                self.request_completion(FALLBACK_MODEL, &messages).await?
            }
            Err(e) => return Err(e),
        };

        self.cache.append_assistant_turn(&note.to_jid, text.clone());
        self.chat
            .send_message(&note.to_jid, &note.account_id, &text, note.reply_to.as_deref())
            .await?;
        info!("Replied to {} ({} characters)", note.to_jid, text.len());
        Ok(())
    }

    async fn request_completion(&self, model: &str, messages: &[Turn]) -> Result<String> {
        let request = MessagesRequest {
            model,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            system: SYSTEM_PROMPT,
            messages,
        };

        let response = self
            .client
            .post(format!("{}{MESSAGES_PATH}", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
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

        let completion: MessagesResponse = response.json().await?;
        if completion.content.is_empty() {
            return Err(BotError::Completion(
                "response contained no content blocks".to_string(),
            ));
        }

        let text = collect_text(&completion.content);
        if text.is_empty() {
            return Err(BotError::Completion(
                "response contained no text content".to_string(),
            ));
        }
        Ok(text)
    }
}
