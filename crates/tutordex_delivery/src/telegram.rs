//! Thin wrapper over the Telegram Bot HTTP API's `sendMessage`.

use serde::Deserialize;
use serde_json::json;

use crate::error::DeliveryError;

pub struct TelegramClient {
    http: reqwest::Client,
    bot_token: String,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramClient {
    pub fn new(bot_token: impl Into<String>, timeout_ms: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_default();
        Self { http, bot_token: bot_token.into() }
    }

    pub async fn send_message(&self, chat_id: i64, html: &str) -> Result<(), DeliveryError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let body = json!({
            "chat_id": chat_id,
            "text": html,
            "parse_mode": "HTML",
        });

        let response = self.http.post(&url).json(&body).send().await?;
        let parsed: SendMessageResponse = response.json().await.map_err(DeliveryError::Network)?;

        if !parsed.ok {
            return Err(DeliveryError::Api(parsed.description.unwrap_or_else(|| "unknown error".to_string())));
        }
        Ok(())
    }
}
