//! Log channel, the delivery of last resort

use async_trait::async_trait;

use super::{Channel, ChannelResult, DeliveryReceipt};
use crate::models::ChannelKind;
use crate::notifications::{Notification, NotificationKind};

/// Writes notifications to the tracing log; never fails
#[derive(Debug, Clone, Default)]
pub struct LogChannel;

impl LogChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Channel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Log
    }

    async fn deliver(&self, notification: &Notification) -> ChannelResult<DeliveryReceipt> {
        match notification.kind {
            NotificationKind::Alert => tracing::warn!(
                recipient = %notification.recipient,
                priority = notification.priority.as_str(),
                subject = %notification.subject,
                body = %notification.body,
                "Operational alert"
            ),
            NotificationKind::Change | NotificationKind::Digest => tracing::info!(
                recipient = %notification.recipient,
                kind = notification.kind.as_str(),
                priority = notification.priority.as_str(),
                changes = notification.change_ids.len(),
                subject = %notification.subject,
                "Notification logged"
            ),
        }
        Ok(DeliveryReceipt::new("log"))
    }
}
