//! Telegram Bot API notifier

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::TelegramConfig;
use crate::error::{Error, Result};
use crate::notifier::Notifier;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

pub struct TelegramNotifier {
    client: Client,
    bot_token: String,
    chat_id: String,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        if config.bot_token.is_empty() {
            return Err(Error::MissingEnvVar("TELEGRAM_BOT_TOKEN".into()));
        }
        if config.chat_id.is_empty() {
            return Err(Error::MissingEnvVar("TELEGRAM_CHAT_ID".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", TELEGRAM_API_URL, self.bot_token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_alert(&self, message: &str) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        // The URL embeds the bot token, keep it out of error strings
        let response = self
            .client
            .post(self.send_message_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Notify(format!("Telegram request failed: {}", e.without_url())))?;

        let status = response.status();
        let body: TelegramResponse = response
            .json()
            .await
            .map_err(|e| Error::Notify(format!("Telegram response unreadable ({}): {}", status, e.without_url())))?;

        if !body.ok {
            return Err(Error::Notify(format!(
                "Telegram rejected message ({}): {}",
                status,
                body.description.unwrap_or_default()
            )));
        }

        debug!(chat_id = %self.chat_id, "Alert delivered to Telegram");
        Ok(())
    }
}
