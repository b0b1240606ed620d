//! Slack incoming-webhook channel

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::webhook::{build_client, JsonPost};
use super::{resolve_target, Channel, ChannelError, ChannelResult, DeliveryReceipt};
use crate::models::ChannelKind;
use crate::notifications::Notification;
use crate::utils::retry::{BackoffStrategy, RetryConfig};

/// Slack's hard limit on message text is 40k characters
const MAX_TEXT_CHARS: usize = 39_000;

/// Slack channel configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Incoming webhook used when the recipient has no Slack target
    pub webhook_url: String,
    /// Display name override
    pub username: Option<String>,
    /// Icon override, e.g. `:fish:`
    pub icon_emoji: Option<String>,
}

/// Slack notification channel
pub struct SlackChannel {
    config: SlackConfig,
    client: Client,
    retry: RetryConfig,
    no_headers: HashMap<String, String>,
}

impl SlackChannel {
    pub fn new(config: SlackConfig) -> ChannelResult<Self> {
        if !config.webhook_url.is_empty() && !config.webhook_url.starts_with("https://") {
            return Err(ChannelError::InvalidConfig(
                "Slack webhook URL must start with https://".to_string(),
            ));
        }

        Ok(Self {
            config,
            client: build_client(10)?,
            retry: RetryConfig::with_delays(3, 1000, 30_000)
                .with_strategy(BackoffStrategy::Exponential),
            no_headers: HashMap::new(),
        })
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Incoming-webhook payload with `&`, `<` and `>` escaped
    fn build_payload(&self, notification: &Notification) -> serde_json::Value {
        let text = format!(
            "*{}*\n{}",
            html_escape::encode_text(&notification.subject),
            html_escape::encode_text(&notification.body)
        );
        let text = crate::utils::truncate_text(&text, MAX_TEXT_CHARS);

        let mut payload = serde_json::json!({ "text": text });
        if let Some(username) = &self.config.username {
            payload["username"] = serde_json::Value::String(username.clone());
        }
        if let Some(icon) = &self.config.icon_emoji {
            payload["icon_emoji"] = serde_json::Value::String(icon.clone());
        }
        payload
    }
}

#[async_trait]
impl Channel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Slack
    }

    async fn deliver(&self, notification: &Notification) -> ChannelResult<DeliveryReceipt> {
        let url = resolve_target(notification, ChannelKind::Slack, Some(&self.config.webhook_url))?;
        let payload = self.build_payload(notification);

        JsonPost {
            client: &self.client,
            url,
            auth_token: None,
            headers: &self.no_headers,
            payload: &payload,
        }
        .send(&self.retry)
        .await?;

        tracing::info!(recipient = %notification.recipient, "Slack message delivered");
        Ok(DeliveryReceipt::new("slack"))
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name(),
            "has_default_webhook": !self.config.webhook_url.is_empty(),
            "username": self.config.username,
        })
    }
}
