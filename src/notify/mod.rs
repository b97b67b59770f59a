//! Notification delivery
//!
//! A `NotificationSink` turns a transition event into a chat message. Each
//! `deliver` call is made once: failures are returned to the notifier
//! actor, which logs and counts them without retrying.

pub mod telegram;
pub mod webhook;

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use crate::ChatId;
use crate::transition::{TransitionEvent, TransitionKind};

pub use telegram::TelegramSink;
pub use webhook::WebhookSink;

/// Upper bound for one delivery request
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client shared by the sinks that talk to a remote API
fn delivery_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .user_agent(concat!("site-monitor/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .context("failed to build notification HTTP client")
}

/// Delivery interface towards the owner's chat
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, chat_id: ChatId, event: &TransitionEvent) -> anyhow::Result<()>;
}

/// Message text sent to the owner
pub fn render_message(event: &TransitionEvent) -> String {
    match &event.kind {
        TransitionKind::Downtime { error } => match error {
            Some(error) => format!("⚠️ Site is down: {}\n{}", event.url, error),
            None => format!("⚠️ Site is down: {}", event.url),
        },

        TransitionKind::Recovery {
            status_code,
            latency_ms,
        } => {
            let mut details = Vec::new();
            if let Some(code) = status_code {
                details.push(format!("code={code}"));
            }
            if let Some(ms) = latency_ms {
                details.push(format!("{ms}ms"));
            }

            if details.is_empty() {
                format!("✅ Site recovered: {}", event.url)
            } else {
                format!("✅ Site recovered: {} ({})", event.url, details.join(" | "))
            }
        }
    }
}

/// Writes notifications to the log instead of sending them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, chat_id: ChatId, event: &TransitionEvent) -> anyhow::Result<()> {
        info!("notify chat {chat_id}: {}", render_message(event));
        Ok(())
    }
}
