//! Notification channels for delivering notifications
//!
//! This module provides the delivery transports: webhooks, Slack incoming
//! webhooks, SMTP email and the log.

pub mod email;
pub mod log;
pub mod slack;
pub mod webhook;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::ChannelKind;
use crate::notifications::Notification;

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur during channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Invalid channel configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Channel cannot serve this recipient (no target of its kind)
    #[error("Channel unavailable: {0}")]
    Unavailable(String),

    /// SMTP transport or message construction failed
    #[error("SMTP error: {0}")]
    Smtp(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error
    #[error("Channel error: {0}")]
    Other(String),
}

impl ChannelError {
    /// Whether retrying the same channel later may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::HttpError(_) | Self::Smtp(_) => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidConfig(_)
            | Self::Unavailable(_)
            | Self::SerializationError(_)
            | Self::Other(_) => false,
        }
    }
}

/// Receipt for a notification a channel accepted
///
/// Failures are reported as [`ChannelError`], so a receipt always means
/// the transport took the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub channel: String,
    /// Transport detail such as the endpoint or mailbox
    pub detail: Option<String>,
    pub delivered_at: DateTime<Utc>,
}

impl DeliveryReceipt {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            detail: None,
            delivered_at: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for DeliveryReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.channel, self.delivered_at.format("%Y-%m-%d %H:%M:%S"))?;
        match &self.detail {
            Some(detail) => write!(f, " ({detail})"),
            None => Ok(()),
        }
    }
}

/// Trait for notification channels
///
/// A channel serves the recipient's first target of its [`ChannelKind`] and
/// reports [`ChannelError::Unavailable`] when the recipient has none.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Strategy name used in logs and the delivery log
    fn name(&self) -> &str;

    /// Target kind this channel serves
    fn kind(&self) -> ChannelKind;

    async fn deliver(&self, notification: &Notification) -> ChannelResult<DeliveryReceipt>;

    /// Settings worth logging at startup; never includes secrets
    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name(),
            "kind": self.kind().as_str(),
        })
    }
}

/// Target of `kind` for `notification`, or `fallback` when configured
pub(crate) fn resolve_target<'a>(
    notification: &'a Notification,
    kind: ChannelKind,
    fallback: Option<&'a str>,
) -> ChannelResult<&'a str> {
    notification
        .target_for(kind)
        .filter(|t| !t.is_empty())
        .or(fallback.filter(|t| !t.is_empty()))
        .ok_or_else(|| {
            ChannelError::Unavailable(format!(
                "no {kind} target for {}",
                notification.recipient
            ))
        })
}
