use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, instrument};

use super::{DELIVERY_TIMEOUT, NotificationSink, delivery_client, render_message};
use crate::ChatId;
use crate::transition::TransitionEvent;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: ChatId,
    pub text: &'a str,
    pub disable_web_page_preview: bool,
}

/// Sends notifications through the Telegram Bot API
#[derive(Debug, Clone)]
pub struct TelegramSink {
    client: Client,
    api_base: String,
    bot_token: String,
}

impl TelegramSink {
    pub fn new(bot_token: impl Into<String>, api_base: Option<String>) -> anyhow::Result<Self> {
        Self::with_timeout(bot_token, api_base, DELIVERY_TIMEOUT)
    }

    pub fn with_timeout(
        bot_token: impl Into<String>,
        api_base: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            client: delivery_client(timeout)?,
            api_base: api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            bot_token: bot_token.into(),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    #[instrument(skip(self, event), fields(target_id = event.target_id))]
    async fn deliver(&self, chat_id: ChatId, event: &TransitionEvent) -> anyhow::Result<()> {
        let text = render_message(event);
        let message = SendMessage {
            chat_id,
            text: &text,
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.send_message_url())
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Telegram API error response: {body}");
            anyhow::bail!("Telegram sendMessage failed with status: {status}");
        }

        debug!("sent Telegram message to chat {chat_id}");
        Ok(())
    }
}
