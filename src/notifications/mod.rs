//! Notification routing and delivery
//!
//! This module turns detected changes into per-subscriber notifications and
//! operational problems into operator alerts, then hands both to the
//! configured delivery channels.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │      NotificationRouter                    │
//! │  - Subscriber filtering                    │
//! │  - Realtime / digest batching              │
//! └────────────────────────────────────────────┘
//!                     │ DeliveryPlan
//!                     ▼
//! ┌────────────────────────────────────────────┐
//! │      DeliveryDispatcher                    │
//! │  - Ordered strategies, first success wins  │
//! └────────────────────────────────────────────┘
//!                     │
//!      ┌──────────┬───┴──────┬──────────┐
//!      ▼          ▼          ▼          ▼
//!  ┌───────┐  ┌───────┐  ┌───────┐  ┌───────┐
//!  │Webhook│  │ Slack │  │ Email │  │  Log  │
//!  └───────┘  └───────┘  └───────┘  └───────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use regwatch::notifications::{DeliveryDispatcher, Notification, NotificationRouter};
//!
//! let router = NotificationRouter::new();
//! for plan in router.route_cycle(&changes, &subscribers) {
//!     let outcome = dispatcher.dispatch(&Notification::for_plan(&plan)).await;
//! }
//! ```

pub mod channels;
pub mod conditions;
pub mod dispatcher;
pub mod router;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use uuid::Uuid;

use crate::models::{ChangeRecord, ChannelDescriptor, ChannelKind, DeliveryMode, Priority};
use crate::scheduler::health::FailureAlert;

// Re-exports
pub use channels::{Channel, ChannelError, ChannelResult, DeliveryReceipt};
pub use conditions::AlertCondition;
pub use dispatcher::{DeliveryAttempt, DeliveryDispatcher, DeliveryOutcome};
pub use router::{DeliveryPlan, NotificationRouter};

/// Recipient name used for operational alerts
pub const OPERATOR_RECIPIENT: &str = "operator";

/// Product name shown in subjects
const BRAND: &str = "AquaRegWatch";

// ============================================================================
// Alerts
// ============================================================================

/// Severity level of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational alerts for tracking purposes
    Info,
    /// Warning alerts that require attention
    Warning,
    /// Critical alerts requiring immediate action
    Critical,
}

impl AlertSeverity {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// Get emoji representation
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Info => "ℹ️",
            Self::Warning => "⚠️",
            Self::Critical => "🚨",
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An operational alert for the operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Unique alert identifier
    pub id: String,
    /// Alert condition that triggered this alert
    pub condition: AlertCondition,
    /// Severity level
    pub severity: AlertSeverity,
    /// Alert message
    pub message: String,
    /// Additional context and metadata
    pub metadata: HashMap<String, String>,
    /// When the alert was created
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Create a new alert
    pub fn new(condition: AlertCondition, severity: AlertSeverity, message: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            condition,
            severity,
            message,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Alert for a source at or above the failure threshold
    pub fn source_failure(failure: &FailureAlert) -> Self {
        let condition = AlertCondition::SourceFailure {
            source: failure.source_id.clone(),
            failure_count: failure.consecutive_failures,
            last_error: failure.last_error.clone(),
        };
        let message = format!(
            "Source '{}' has failed {} times in a row (threshold {})",
            failure.source_id, failure.consecutive_failures, failure.threshold
        );

        Self::new(condition, failure.severity(), message)
            .with_metadata("threshold".to_string(), failure.threshold.to_string())
            .with_metadata(
                "failing_since".to_string(),
                failure.first_failure_at.to_rfc3339(),
            )
    }

    /// Alert for a source that fetched successfully after alerting
    pub fn source_recovered(source_id: &str) -> Self {
        Self::new(
            AlertCondition::SourceRecovered {
                source: source_id.to_string(),
            },
            AlertSeverity::Info,
            format!("Source '{source_id}' is fetching successfully again"),
        )
    }

    /// Alert for a health check that found failing components
    ///
    /// Critical when the store itself is unreachable, a warning otherwise.
    pub fn health_check_failed(failed: Vec<String>, store_ok: bool) -> Self {
        let severity = if store_ok {
            AlertSeverity::Warning
        } else {
            AlertSeverity::Critical
        };
        let message = format!("Health check degraded: {}", failed.join("; "));
        Self::new(AlertCondition::HealthCheckFailed { failed }, severity, message)
    }

    /// Add metadata to the alert
    pub fn with_metadata(mut self, key: String, value: String) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Format alert for display
    pub fn format_message(&self) -> String {
        format!(
            "[{severity}] {message}\nCondition: {condition}\nCreated: {created}",
            severity = self.severity.as_str().to_uppercase(),
            message = self.message,
            condition = self.condition.description(),
            created = self.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }
}

// ============================================================================
// Notification
// ============================================================================

/// What a notification carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Change,
    Digest,
    Alert,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Change => "change",
            Self::Digest => "digest",
            Self::Alert => "alert",
        }
    }
}

/// Rendered message handed to delivery channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    /// Subscriber id, or [`OPERATOR_RECIPIENT`]
    pub recipient: String,
    pub recipient_name: String,
    /// Ordered delivery targets of the recipient
    pub targets: Vec<ChannelDescriptor>,
    pub subject: String,
    /// Plain-text body
    pub body: String,
    pub priority: Priority,
    /// Changes covered, empty for alerts
    pub change_ids: Vec<String>,
    /// Structured payload for machine consumers
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Notification for one routed plan
    pub fn for_plan(plan: &DeliveryPlan) -> Self {
        let now = Utc::now();
        let priority = plan
            .changes
            .iter()
            .map(|c| c.priority)
            .max()
            .unwrap_or_default();

        let (kind, subject, body) = match plan.mode {
            DeliveryMode::Digest => (
                NotificationKind::Digest,
                format!(
                    "{BRAND} oversikt: {} endringer ({})",
                    plan.changes.len(),
                    now.format("%d.%m.%Y")
                ),
                render_digest(&plan.subscriber_name, &plan.changes),
            ),
            DeliveryMode::Realtime => {
                let title = plan
                    .changes
                    .first()
                    .map(|c| c.summary.title.as_str())
                    .unwrap_or_default();
                (
                    NotificationKind::Change,
                    format!("{BRAND} [{}]: {title}", priority.as_str().to_uppercase()),
                    plan.changes.iter().map(render_change).collect::<Vec<_>>().join("\n---\n\n"),
                )
            }
        };

        let payload = serde_json::json!({
            "type": kind.as_str(),
            "recipient": plan.subscriber_id,
            "priority": priority.as_str(),
            "changes": plan.changes.iter().map(change_payload).collect::<Vec<_>>(),
        });

        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            recipient: plan.subscriber_id.clone(),
            recipient_name: plan.subscriber_name.clone(),
            targets: plan.channels.clone(),
            subject,
            body,
            priority,
            change_ids: plan.changes.iter().map(|c| c.id.clone()).collect(),
            payload,
            created_at: now,
        }
    }

    /// Notification carrying an operational alert
    pub fn for_alert(alert: &Alert, targets: &[ChannelDescriptor]) -> Self {
        let priority = match alert.severity {
            AlertSeverity::Critical => Priority::Critical,
            AlertSeverity::Warning => Priority::High,
            AlertSeverity::Info => Priority::Low,
        };

        Self {
            id: alert.id.clone(),
            kind: NotificationKind::Alert,
            recipient: OPERATOR_RECIPIENT.to_string(),
            recipient_name: OPERATOR_RECIPIENT.to_string(),
            targets: targets.to_vec(),
            subject: format!(
                "{} {BRAND} [{}]: {}",
                alert.severity.emoji(),
                alert.severity.as_str().to_uppercase(),
                alert.condition.description()
            ),
            body: alert.format_message(),
            priority,
            change_ids: Vec::new(),
            payload: serde_json::json!({
                "type": NotificationKind::Alert.as_str(),
                "id": alert.id,
                "alert_type": alert.condition.condition_type(),
                "source": alert.condition.source(),
                "severity": alert.severity.as_str(),
                "message": alert.message,
                "condition": alert.condition,
                "metadata": alert.metadata,
                "created_at": alert.created_at.to_rfc3339(),
            }),
            created_at: alert.created_at,
        }
    }

    /// First target of the given kind
    pub fn target_for(&self, kind: ChannelKind) -> Option<&str> {
        self.targets
            .iter()
            .find(|t| t.kind == kind)
            .map(|t| t.target.as_str())
    }
}

fn change_payload(change: &ChangeRecord) -> serde_json::Value {
    serde_json::json!({
        "id": change.id,
        "source_id": change.source_id,
        "source_name": change.source_name,
        "source_url": change.source_url,
        "category": change.category,
        "priority": change.priority.as_str(),
        "change_percent": change.change_percent,
        "keywords": change.keywords,
        "summary": change.summary,
        "detected_at": change.detected_at.to_rfc3339(),
    })
}

/// Plain-text rendering of one change, Norwegian first
pub fn render_change(change: &ChangeRecord) -> String {
    let summary = &change.summary;
    let mut out = String::new();

    let _ = writeln!(out, "{}", summary.title);
    let _ = writeln!(out, "Kilde / Source: {} ({})", change.source_name, change.source_url);
    let _ = writeln!(
        out,
        "Kategori: {} | Prioritet: {} | Endret: {}%",
        change.category,
        change.priority.as_str().to_uppercase(),
        change.change_percent
    );

    if !summary.narrative.is_empty() {
        let _ = write!(out, "\n{}\n", summary.narrative);
    }
    if !summary.narrative_en.is_empty() {
        let _ = write!(out, "\n{}\n", summary.narrative_en);
    }
    if !summary.who_affected.is_empty() {
        let _ = write!(out, "\nHvem påvirkes: {}\n", summary.who_affected.join(", "));
    }
    if !summary.action_items.is_empty() {
        let _ = writeln!(out, "\nHandlingspunkter / Action items:");
        for item in &summary.action_items {
            match &item.deadline {
                Some(deadline) => {
                    let _ = writeln!(out, "- {} (Frist: {deadline})", item.action);
                }
                None => {
                    let _ = writeln!(out, "- {}", item.action);
                }
            }
        }
    }
    if !summary.deadlines.is_empty() {
        let _ = writeln!(out, "Frister / Deadlines: {}", summary.deadlines.join(", "));
    }
    if !change.keywords.is_empty() {
        let _ = writeln!(out, "Nøkkelord / Keywords: {}", change.keywords.join(", "));
    }

    out
}

fn render_digest(name: &str, changes: &[ChangeRecord]) -> String {
    let count = |p: Priority| changes.iter().filter(|c| c.priority == p).count();
    let mut out = format!(
        "Hei {name},\n\nOversikt / Summary: kritisk {} | høy {} | medium {} | lav {}\n\n",
        count(Priority::Critical),
        count(Priority::High),
        count(Priority::Medium),
        count(Priority::Low),
    );
    out.push_str(
        &changes
            .iter()
            .map(render_change)
            .collect::<Vec<_>>()
            .join("\n---\n\n"),
    );
    out
}
