//! Webhook notification channel
//!
//! This module provides a webhook channel for sending notifications via HTTP
//! POST requests.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::{resolve_target, Channel, ChannelError, ChannelResult, DeliveryReceipt};
use crate::models::ChannelKind;
use crate::notifications::Notification;
use crate::utils::retry::{with_retry_if, BackoffStrategy, RetryConfig};

/// Webhook channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Endpoint used when the recipient has no webhook target of its own
    #[serde(default)]
    pub url: String,
    /// Optional authentication token (sent as Bearer token)
    pub auth_token: Option<String>,
    /// Custom headers to include in requests
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Maximum attempts per delivery
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds, doubled afterwards
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_timeout() -> u64 {
    10
}

fn default_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self::new("")
    }
}

impl WebhookConfig {
    /// Create a new webhook configuration
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            headers: HashMap::new(),
            timeout_secs: default_timeout(),
            max_attempts: default_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }

    /// Set authentication token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Add a custom header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set attempt budget and first retry delay
    pub fn with_retries(mut self, max_attempts: u32, retry_delay_ms: u64) -> Self {
        self.max_attempts = max_attempts;
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    /// Retry policy derived from this configuration
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::with_delays(self.max_attempts, self.retry_delay_ms, 60_000)
            .with_strategy(BackoffStrategy::Exponential)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        // Basic URL validation
        if !self.url.is_empty()
            && !self.url.starts_with("http://")
            && !self.url.starts_with("https://")
        {
            return Err("Webhook URL must start with http:// or https://".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        if self.max_attempts == 0 {
            return Err("Max attempts must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Build the shared HTTP client for webhook-style channels
pub(crate) fn build_client(timeout_secs: u64) -> ChannelResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ChannelError::Other(format!("Failed to create HTTP client: {e}")))
}

/// Request description shared by webhook and Slack deliveries
pub(crate) struct JsonPost<'a> {
    pub client: &'a Client,
    pub url: &'a str,
    pub auth_token: Option<&'a str>,
    pub headers: &'a HashMap<String, String>,
    pub payload: &'a serde_json::Value,
}

impl JsonPost<'_> {
    /// POST the payload, retrying transport errors and 429/5xx answers
    ///
    /// Client errors (4xx) fail immediately.
    pub(crate) async fn send(&self, retry: &RetryConfig) -> ChannelResult<u16> {
        with_retry_if(retry, |attempt| self.send_once(attempt), ChannelError::is_recoverable).await
    }

    async fn send_once(&self, attempt: u32) -> ChannelResult<u16> {
        if attempt > 1 {
            tracing::debug!(url = %self.url, attempt = attempt, "Retrying webhook request");
        }

        let mut request = self.client.post(self.url);

        // Add authentication if configured
        if let Some(token) = self.auth_token {
            request = request.bearer_auth(token);
        }

        // Add custom headers
        for (key, value) in self.headers {
            request = request.header(key, value);
        }

        let response = request.json(self.payload).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(status.as_u16());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());
        Err(ChannelError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Webhook notification channel
///
/// Sends notifications as JSON payloads via HTTP POST requests.
///
/// # Payload Format
///
/// ```json
/// {
///   "id": "notification-uuid",
///   "kind": "change",
///   "recipient": "salmon-co",
///   "subject": "AquaRegWatch [HIGH]: Endring: Fiskeridirektoratet",
///   "body": "...",
///   "priority": "high",
///   "data": { "type": "change", "changes": [ ... ] },
///   "created_at": "2026-01-01T12:00:00Z"
/// }
/// ```
///
/// # Example
///
/// ```rust,ignore
/// use regwatch::notifications::channels::webhook::{WebhookChannel, WebhookConfig};
///
/// let config = WebhookConfig::new("https://hooks.example.com/regwatch")
///     .with_auth_token("secret-token")
///     .with_header("X-Custom-Header", "value")
///     .with_timeout(15);
///
/// let channel = WebhookChannel::new(config)?;
/// channel.deliver(&notification).await?;
/// ```
pub struct WebhookChannel {
    config: WebhookConfig,
    client: Client,
    retry: RetryConfig,
}

impl WebhookChannel {
    /// Create a new webhook channel
    pub fn new(config: WebhookConfig) -> ChannelResult<Self> {
        config.validate().map_err(ChannelError::InvalidConfig)?;

        let client = build_client(config.timeout_secs)?;
        let retry = config.retry_config();

        Ok(Self {
            config,
            client,
            retry,
        })
    }

    /// Create a simple webhook channel with just a URL
    pub fn from_url(url: impl Into<String>) -> ChannelResult<Self> {
        Self::new(WebhookConfig::new(url))
    }

    /// Get the fallback webhook URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Build the webhook payload from a notification
    fn build_payload(&self, notification: &Notification) -> serde_json::Value {
        serde_json::json!({
            "id": notification.id,
            "kind": notification.kind.as_str(),
            "recipient": notification.recipient,
            "subject": notification.subject,
            "body": notification.body,
            "priority": notification.priority.as_str(),
            "data": notification.payload,
            "created_at": notification.created_at.to_rfc3339(),
        })
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    async fn deliver(&self, notification: &Notification) -> ChannelResult<DeliveryReceipt> {
        let url = resolve_target(notification, ChannelKind::Webhook, Some(&self.config.url))?;
        let payload = self.build_payload(notification);

        let post = JsonPost {
            client: &self.client,
            url,
            auth_token: self.config.auth_token.as_deref(),
            headers: &self.config.headers,
            payload: &payload,
        };
        let status = post.send(&self.retry).await?;

        tracing::info!(
            url = %url,
            status = status,
            recipient = %notification.recipient,
            "Webhook delivered"
        );
        Ok(DeliveryReceipt::new("webhook").with_detail(format!("{url} answered {status}")))
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name(),
            "url": self.config.url,
            "timeout_secs": self.config.timeout_secs,
            "max_attempts": self.config.max_attempts,
            "has_auth": self.config.auth_token.is_some(),
            "custom_headers": self.config.headers.keys().collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChannelDescriptor;
    use crate::notifications::{Alert, AlertCondition, AlertSeverity};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert_notification(targets: Vec<ChannelDescriptor>) -> Notification {
        let alert = Alert::new(
            AlertCondition::SourceFailure {
                source: "lovdata".to_string(),
                failure_count: 3,
                last_error: "timeout".to_string(),
            },
            AlertSeverity::Warning,
            "Source failing".to_string(),
        );
        Notification::for_alert(&alert, &targets)
    }

    #[test]
    fn test_webhook_config_validation() {
        // Valid config
        assert!(WebhookConfig::new("https://example.com/webhook").validate().is_ok());
        assert!(WebhookConfig::default().validate().is_ok());

        // Invalid: no protocol
        assert!(WebhookConfig::new("example.com/webhook").validate().is_err());

        // Invalid: zero timeout
        assert!(WebhookConfig::new("https://example.com").with_timeout(0).validate().is_err());
    }

    #[test]
    fn test_webhook_config_builder() {
        let config = WebhookConfig::new("https://example.com/webhook")
            .with_auth_token("secret-token")
            .with_header("X-Custom", "value")
            .with_timeout(30)
            .with_retries(5, 10);

        assert_eq!(config.auth_token, Some("secret-token".to_string()));
        assert_eq!(config.headers.get("X-Custom"), Some(&"value".to_string()));
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.retry_config().max_attempts, 5);
    }

    #[test]
    fn test_webhook_payload_building() {
        let channel = WebhookChannel::from_url("https://example.com/webhook").unwrap();
        let notification = alert_notification(vec![]);

        let payload = channel.build_payload(&notification);

        assert_eq!(payload["kind"], "alert");
        assert_eq!(payload["recipient"], "operator");
        assert_eq!(payload["priority"], "high");
        assert_eq!(payload["data"]["severity"], "warning");
    }

    #[tokio::test]
    async fn test_missing_target_is_unavailable() {
        let channel = WebhookChannel::new(WebhookConfig::default()).unwrap();
        let err = channel.deliver(&alert_notification(vec![])).await.unwrap_err();
        assert!(matches!(err, ChannelError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_delivery_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let channel =
            WebhookChannel::new(WebhookConfig::default().with_auth_token("s3cret")).unwrap();
        let target = ChannelDescriptor::new(ChannelKind::Webhook, format!("{}/hook", server.uri()));
        let receipt = channel.deliver(&alert_notification(vec![target])).await.unwrap();
        assert!(receipt.detail.unwrap_or_default().ends_with("/hook answered 200"));
    }

    #[tokio::test]
    async fn test_retries_server_errors_but_not_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bad"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let config = WebhookConfig::new(format!("{}/flaky", server.uri())).with_retries(2, 1);
        let channel = WebhookChannel::new(config).unwrap();
        let err = channel.deliver(&alert_notification(vec![])).await.unwrap_err();
        assert!(matches!(err, ChannelError::Rejected { status: 503, .. }));

        let config = WebhookConfig::new(format!("{}/bad", server.uri())).with_retries(3, 1);
        let channel = WebhookChannel::new(config).unwrap();
        let err = channel.deliver(&alert_notification(vec![])).await.unwrap_err();
        assert!(matches!(err, ChannelError::Rejected { status: 400, .. }));
    }
}
