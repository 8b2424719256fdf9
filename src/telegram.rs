use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::TELEGRAM_API_BASE;

/// Server-side long-poll timeout for `getUpdates`.
pub const LONG_POLL_SECS: u64 = 30;

/// Request timeout for ordinary calls; `getUpdates` gets extra headroom on
/// top of its long-poll window.
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimal Telegram Bot API client over plain HTTP.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
}

/// One inbound update from `getUpdates`. Exactly one payload variant is
/// expected per update; both being absent means an update kind we ignore.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub data: Option<String>,
    pub message: Option<Message>,
}

/// Inline keyboard attached to an outbound message.
#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: &str, callback_data: &str) -> Self {
        Self {
            text: text.to_string(),
            callback_data: callback_data.to_string(),
        }
    }
}

impl InlineKeyboard {
    pub fn rows(rows: Vec<Vec<InlineButton>>) -> Self {
        Self {
            inline_keyboard: rows,
        }
    }

    /// Single-button keyboard, the most common shape.
    pub fn single(text: &str, callback_data: &str) -> Self {
        Self::rows(vec![vec![InlineButton::new(text, callback_data)]])
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
    #[serde(default)]
    result: Value,
}

impl TelegramClient {
    pub fn new(token: &str) -> Self {
        Self::with_base(TELEGRAM_API_BASE, token)
    }

    pub fn with_base(base: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: format!("{base}/bot{token}"),
        }
    }

    async fn call(&self, method: &str, payload: Value, timeout: Duration) -> Result<Value> {
        let resp = self
            .http
            .post(format!("{}/{method}", self.base))
            .json(&payload)
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("telegram {method} request failed"))?;
        let body: ApiResponse = resp
            .json()
            .await
            .with_context(|| format!("telegram {method} returned malformed JSON"))?;
        if !body.ok {
            return Err(anyhow!(
                "telegram {method} rejected: {}",
                body.description.unwrap_or_else(|| "unknown error".to_string())
            ));
        }
        Ok(body.result)
    }

    /// Send a Markdown-formatted message, optionally with an inline keyboard.
    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        markup: Option<&InlineKeyboard>,
    ) -> Result<()> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        if let Some(markup) = markup {
            payload["reply_markup"] = serde_json::to_value(markup)?;
        }
        self.call("sendMessage", payload, CALL_TIMEOUT).await?;
        Ok(())
    }

    /// Edit a previously sent message in place (used for menu navigation).
    pub async fn edit_message(
        &self,
        chat_id: &str,
        message_id: i64,
        text: &str,
        markup: Option<&InlineKeyboard>,
    ) -> Result<()> {
        let mut payload = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        if let Some(markup) = markup {
            payload["reply_markup"] = serde_json::to_value(markup)?;
        }
        self.call("editMessageText", payload, CALL_TIMEOUT).await?;
        Ok(())
    }

    /// Acknowledge a callback query so the client stops its spinner.
    pub async fn answer_callback(&self, callback_query_id: &str) -> Result<()> {
        let payload = json!({ "callback_query_id": callback_query_id });
        self.call("answerCallbackQuery", payload, CALL_TIMEOUT)
            .await?;
        Ok(())
    }

    /// Long-poll for updates after `offset`. Blocks server-side for up to
    /// [`LONG_POLL_SECS`]; the request timeout leaves headroom beyond that.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let payload = json!({ "offset": offset, "timeout": LONG_POLL_SECS });
        let result = self
            .call(
                "getUpdates",
                payload,
                Duration::from_secs(LONG_POLL_SECS + 10),
            )
            .await?;
        let updates = serde_json::from_value(result).context("malformed getUpdates result")?;
        Ok(updates)
    }
}
