//! Alert conditions for operational notifications
//!
//! Only source and system health reach an operator; everything else is
//! routed to subscribers as change notifications.

use serde::{Deserialize, Serialize};

/// Health events that raise an operator alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertCondition {
    /// Consecutive fetch failures reached the threshold
    ///
    /// ```rust,ignore
    /// AlertCondition::SourceFailure {
    ///     source: "fiskeridir-akvakultur".to_string(),
    ///     failure_count: 3,
    ///     last_error: "Server error: 503".to_string(),
    /// }
    /// ```
    SourceFailure {
        source: String,
        failure_count: u32,
        /// Message of the most recent failure
        last_error: String,
    },

    /// A source that was alerting fetched successfully again
    SourceRecovered { source: String },

    /// An on-demand health check found failing components
    HealthCheckFailed {
        /// One entry per failing component, `"<component>: <error>"`
        failed: Vec<String>,
    },
}

impl AlertCondition {
    /// One-line description used in subjects and log lines
    pub fn description(&self) -> String {
        match self {
            Self::SourceFailure {
                source,
                failure_count,
                last_error,
            } => {
                format!("Source '{source}' failed {failure_count} consecutive times: {last_error}")
            }
            Self::SourceRecovered { source } => format!("Source '{source}' recovered"),
            Self::HealthCheckFailed { failed } => {
                format!("Health check failed for {} component(s)", failed.len())
            }
        }
    }

    /// Serde tag of the variant
    pub fn condition_type(&self) -> &'static str {
        match self {
            Self::SourceFailure { .. } => "source_failure",
            Self::SourceRecovered { .. } => "source_recovered",
            Self::HealthCheckFailed { .. } => "health_check_failed",
        }
    }

    /// Source the condition is about, if it concerns a single one
    pub fn source(&self) -> Option<&str> {
        match self {
            Self::SourceFailure { source, .. } | Self::SourceRecovered { source } => Some(source),
            Self::HealthCheckFailed { .. } => None,
        }
    }
}
