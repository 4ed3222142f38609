//! Minimal Telegram Bot API client: the update types the bot reads, the
//! keyboard markup it sends, and the [`ChatApi`] seam the handlers talk to.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::trace;

use engine::EngineError;

const API_BASE: &str = "https://api.telegram.org";

/// Long-poll timeout passed to `getUpdates`, in seconds.
pub const POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error in {method}: {description}")]
    Api { method: String, description: String },

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

pub type BotResult<T> = Result<T, BotError>;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// Account that produced the update, if any.
    pub fn sender_id(&self) -> Option<i64> {
        self.message
            .as_ref()
            .and_then(|message| message.from.as_ref())
            .or(self.callback_query.as_ref().map(|callback| &callback.from))
            .map(|user| user.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<TgUser>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TgUser,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebAppInfo {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_app: Option<WebAppInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyKeyboardRemove {
    pub remove_keyboard: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Keyboard(ReplyKeyboardMarkup),
    Inline(InlineKeyboardMarkup),
    Remove(ReplyKeyboardRemove),
}

impl From<InlineKeyboardMarkup> for ReplyMarkup {
    fn from(markup: InlineKeyboardMarkup) -> Self {
        ReplyMarkup::Inline(markup)
    }
}

impl From<ReplyKeyboardMarkup> for ReplyMarkup {
    fn from(markup: ReplyKeyboardMarkup) -> Self {
        ReplyMarkup::Keyboard(markup)
    }
}

/// Outgoing operations the bot needs from the chat platform.
#[async_trait]
pub trait ChatApi: Send + Sync + 'static {
    /// Sends a message and returns its id.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> BotResult<i64>;

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> BotResult<()>;

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> BotResult<()>;
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiEnvelope<T> {
    fn into_result(self, method: &str) -> BotResult<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (_, _) => Err(BotError::Api {
                method: method.to_string(),
                description: self
                    .description
                    .unwrap_or_else(|| "empty result".to_string()),
            }),
        }
    }
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

impl TelegramClient {
    pub fn new(token: &str) -> BotResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()?;
        Ok(Self {
            http,
            base_url: format!("{API_BASE}/bot{token}"),
        })
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> BotResult<R> {
        trace!("Calling Telegram method {}", method);
        let envelope: ApiEnvelope<R> = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(&params)
            .send()
            .await?
            .json()
            .await?;

        envelope.into_result(method)
    }

    /// Returns the bot's own account; fails fast on a bad token.
    pub async fn get_me(&self) -> BotResult<TgUser> {
        self.call("getMe", json!({})).await
    }

    pub async fn get_updates(&self, offset: i64) -> BotResult<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }
}

#[async_trait]
impl ChatApi for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> BotResult<i64> {
        let mut params = json!({ "chat_id": chat_id, "text": text });
        if let Some(markup) = markup {
            params["reply_markup"] = serde_json::to_value(markup).unwrap_or_default();
        }
        let message: Message = self.call("sendMessage", params).await?;
        Ok(message.message_id)
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> BotResult<()> {
        let mut params = json!({ "chat_id": chat_id, "message_id": message_id, "text": text });
        if let Some(markup) = markup {
            params["reply_markup"] = serde_json::to_value(markup).unwrap_or_default();
        }
        // Returns the edited message, or `true` for inline messages.
        let _: serde_json::Value = self.call("editMessageText", params).await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> BotResult<()> {
        let mut params = json!({ "callback_query_id": callback_id, "show_alert": show_alert });
        if let Some(text) = text {
            params["text"] = json!(text);
        }
        let _: bool = self.call("answerCallbackQuery", params).await?;
        Ok(())
    }
}
