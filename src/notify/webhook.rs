use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, instrument};

use super::{DELIVERY_TIMEOUT, NotificationSink, delivery_client, render_message};
use crate::ChatId;
use crate::transition::TransitionEvent;

/// Posts every notification as JSON to a fixed URL
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_timeout(url, DELIVERY_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: delivery_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    #[instrument(skip(self, event), fields(target_id = event.target_id))]
    async fn deliver(&self, chat_id: ChatId, event: &TransitionEvent) -> anyhow::Result<()> {
        let payload = json!({
            "chat_id": chat_id,
            "message": render_message(event),
            "event": event,
            "timestamp": event.at.to_rfc3339(),
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("webhook failed with status: {}", response.status());
        }

        debug!("webhook delivered for chat {chat_id}");
        Ok(())
    }
}
