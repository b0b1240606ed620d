//! Ordered delivery strategies
//!
//! A [`DeliveryDispatcher`] holds the configured channels in priority order
//! and tries them one after another until one delivers. Every attempt is
//! logged and kept in the [`DeliveryOutcome`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::channels::email::EmailChannel;
use super::channels::log::LogChannel;
use super::channels::slack::SlackChannel;
use super::channels::webhook::WebhookChannel;
use super::channels::{Channel, ChannelError, ChannelResult};
use super::Notification;
use crate::config::DeliveryConfig;
use crate::models::{ChannelKind, DeliveryLogEntry, DeliveryState};

/// One try of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub channel: String,
    pub success: bool,
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

/// Result of dispatching one notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub recipient: String,
    pub change_ids: Vec<String>,
    pub attempts: Vec<DeliveryAttempt>,
    /// Channel that delivered, if any did
    pub delivered_via: Option<String>,
}

impl DeliveryOutcome {
    pub fn succeeded(&self) -> bool {
        self.delivered_via.is_some()
    }

    /// Error of the last failed attempt
    pub fn last_error(&self) -> Option<&str> {
        self.attempts.iter().rev().find_map(|a| a.error.as_deref())
    }

    /// Delivery-log rows, one per covered change (one row for alerts)
    ///
    /// The channel is the one that delivered, or the last one tried.
    pub fn log_entries(&self, now: DateTime<Utc>) -> Vec<DeliveryLogEntry> {
        let channel = self
            .delivered_via
            .clone()
            .or_else(|| self.attempts.last().map(|a| a.channel.clone()))
            .unwrap_or_else(|| "none".to_string());
        let (status, error) = if self.succeeded() {
            (DeliveryState::Sent, None)
        } else {
            (
                DeliveryState::Failed,
                Some(
                    self.last_error()
                        .unwrap_or("no delivery strategy configured")
                        .to_string(),
                ),
            )
        };
        let attempted_at = self.attempts.last().map_or(now, |a| a.attempted_at);

        let entry = |change_id: Option<String>| DeliveryLogEntry {
            recipient: self.recipient.clone(),
            change_id,
            channel: channel.clone(),
            status,
            error: error.clone(),
            attempted_at,
        };

        if self.change_ids.is_empty() {
            vec![entry(None)]
        } else {
            self.change_ids.iter().map(|id| entry(Some(id.clone()))).collect()
        }
    }
}

/// Tries delivery strategies in order until one succeeds
#[derive(Clone)]
pub struct DeliveryDispatcher {
    strategies: Vec<Arc<dyn Channel>>,
}

impl DeliveryDispatcher {
    pub fn new(strategies: Vec<Arc<dyn Channel>>) -> Self {
        Self { strategies }
    }

    /// Build the channels named in `delivery.strategies`, in that order
    pub fn from_config(config: &DeliveryConfig) -> ChannelResult<Self> {
        let strategies = config
            .strategies
            .iter()
            .map(|kind| -> ChannelResult<Arc<dyn Channel>> {
                let channel: Arc<dyn Channel> = match kind {
                    ChannelKind::Webhook => Arc::new(WebhookChannel::new(config.webhook.clone())?),
                    ChannelKind::Slack => Arc::new(SlackChannel::new(config.slack.clone())?),
                    ChannelKind::Email => Arc::new(EmailChannel::new(config.email.clone())?),
                    ChannelKind::Log => Arc::new(LogChannel::new()),
                };
                tracing::debug!(settings = %channel.config(), "Delivery strategy enabled");
                Ok(channel)
            })
            .collect::<ChannelResult<Vec<_>>>()?;

        Ok(Self::new(strategies))
    }

    /// Names of the strategies, in order
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Deliver `notification` through the first strategy that succeeds
    ///
    /// Strategies without a target for the recipient are skipped without an
    /// attempt being recorded. Never fails; the outcome says what happened.
    pub async fn dispatch(&self, notification: &Notification) -> DeliveryOutcome {
        let mut attempts = Vec::new();
        let mut delivered_via = None;

        for strategy in &self.strategies {
            let result = strategy.deliver(notification).await;
            let attempted_at = Utc::now();

            let error = match result {
                Ok(receipt) => {
                    tracing::debug!(receipt = %receipt, "Channel accepted notification");
                    None
                }
                Err(ChannelError::Unavailable(reason)) => {
                    tracing::debug!(
                        channel = strategy.name(),
                        recipient = %notification.recipient,
                        reason = %reason,
                        "Strategy skipped"
                    );
                    continue;
                }
                Err(e) => Some(e.to_string()),
            };

            crate::metrics::record_delivery(strategy.name(), error.is_none());

            match &error {
                None => tracing::info!(
                    channel = strategy.name(),
                    recipient = %notification.recipient,
                    changes = notification.change_ids.len(),
                    "Notification delivered"
                ),
                Some(e) => tracing::warn!(
                    channel = strategy.name(),
                    recipient = %notification.recipient,
                    error = %e,
                    "Delivery attempt failed, trying next strategy"
                ),
            }

            let success = error.is_none();
            attempts.push(DeliveryAttempt {
                channel: strategy.name().to_string(),
                success,
                error,
                attempted_at,
            });

            if success {
                delivered_via = Some(strategy.name().to_string());
                break;
            }
        }

        if delivered_via.is_none() {
            tracing::error!(
                recipient = %notification.recipient,
                attempts = attempts.len(),
                "Notification could not be delivered"
            );
        }

        DeliveryOutcome {
            recipient: notification.recipient.clone(),
            change_ids: notification.change_ids.clone(),
            attempts,
            delivered_via,
        }
    }
}
