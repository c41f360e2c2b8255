//! Chat transport: the outbound port and its long-poll HTTP adapter.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::BotError;

/// An incoming update from the chat platform.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<ChatMessage>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<ChatUser>,
    pub chat: ChatInfo,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatInfo {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: ChatUser,
    #[serde(default)]
    pub message: Option<ChatMessage>,
    #[serde(default)]
    pub data: Option<String>,
}

/// One row-major inline keyboard.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
            url: None,
        }
    }

    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }
}

/// Outbound port to the chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, BotError>;

    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<ChatMessage, BotError>;

    async fn send_photo(
        &self,
        chat_id: &str,
        photo_url: &str,
        caption: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<ChatMessage, BotError>;

    async fn edit_message_text(
        &self,
        chat_id: &str,
        message_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<(), BotError>;

    async fn answer_callback_query(&self, callback_id: &str) -> Result<(), BotError>;

    async fn get_chat(&self, target: &str) -> Result<ChatInfo, BotError>;

    async fn get_me(&self) -> Result<ChatUser, BotError>;
}

/// Long-poll HTTP adapter for the standard bot API.
pub struct TelegramTransport {
    http: reqwest::Client,
    base: String,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
struct ApiReply<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramTransport {
    pub fn new(api_base: &str, bot_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: format!("{}/bot{}", api_base.trim_end_matches('/'), bot_token),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, BotError> {
        let reply: ApiReply<T> = self
            .http
            .post(format!("{}/{method}", self.base))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        if !reply.ok {
            return Err(BotError::Chat(
                reply.description.unwrap_or_else(|| method.to_string()),
            ));
        }
        reply
            .result
            .ok_or_else(|| BotError::Chat(format!("{method}: empty result")))
    }

    fn with_keyboard(mut body: Value, keyboard: Option<InlineKeyboard>) -> Value {
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = json!(keyboard);
        }
        body
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, BotError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<ChatMessage, BotError> {
        let body = json!({ "chat_id": chat_id, "text": text });
        self.call("sendMessage", Self::with_keyboard(body, keyboard))
            .await
    }

    async fn send_photo(
        &self,
        chat_id: &str,
        photo_url: &str,
        caption: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<ChatMessage, BotError> {
        let body = json!({ "chat_id": chat_id, "photo": photo_url, "caption": caption });
        self.call("sendPhoto", Self::with_keyboard(body, keyboard))
            .await
    }

    async fn edit_message_text(
        &self,
        chat_id: &str,
        message_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<(), BotError> {
        let body = json!({ "chat_id": chat_id, "message_id": message_id, "text": text });
        // The edited message comes back; nothing needs it.
        let _: Value = self
            .call("editMessageText", Self::with_keyboard(body, keyboard))
            .await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str) -> Result<(), BotError> {
        let _: Value = self
            .call("answerCallbackQuery", json!({ "callback_query_id": callback_id }))
            .await?;
        Ok(())
    }

    async fn get_chat(&self, target: &str) -> Result<ChatInfo, BotError> {
        self.call("getChat", json!({ "chat_id": target })).await
    }

    async fn get_me(&self) -> Result<ChatUser, BotError> {
        self.call("getMe", json!({})).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_deserializes_message_and_callback() {
        let raw = json!({
            "update_id": 5,
            "callback_query": {
                "id": "cb1",
                "from": { "id": 42, "username": "ann" },
                "message": {
                    "message_id": 7,
                    "chat": { "id": 42, "type": "private" }
                },
                "data": "ans:1"
            }
        });
        let update: Update = serde_json::from_value(raw).unwrap();
        let callback = update.callback_query.unwrap();
        assert_eq!(callback.data.as_deref(), Some("ans:1"));
        assert_eq!(callback.from.id, 42);
    }

    #[test]
    fn keyboard_serializes_to_reply_markup_shape() {
        let keyboard = InlineKeyboard {
            inline_keyboard: vec![vec![
                InlineButton::callback("Red", "ans:0"),
                InlineButton::link("Open", "https://example.com"),
            ]],
        };
        let value = json!(keyboard);
        assert_eq!(value["inline_keyboard"][0][0]["callback_data"], "ans:0");
        assert!(value["inline_keyboard"][0][0].get("url").is_none());
        assert_eq!(value["inline_keyboard"][0][1]["url"], "https://example.com");
    }
}
