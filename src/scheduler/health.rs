//! Per-source failure tracking
//!
//! Counts consecutive failed fetches per source. Once a source reaches the
//! alert threshold the tracker reports a [`FailureAlert`] on every further
//! failure until a successful fetch clears the state. The tracker never
//! delivers anything itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::FailureState;
use crate::notifications::AlertSeverity;

/// Consecutive failures before a source is reported
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

// ============================================================================
// Failure Alert
// ============================================================================

/// Alert condition raised for a persistently failing source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureAlert {
    pub source_id: String,
    pub consecutive_failures: u32,
    pub threshold: u32,
    pub first_failure_at: DateTime<Utc>,
    pub last_error: String,
}

impl FailureAlert {
    fn from_state(state: &FailureState, threshold: u32) -> Self {
        Self {
            source_id: state.source_id.clone(),
            consecutive_failures: state.consecutive_failures,
            threshold,
            first_failure_at: state.first_failure_at,
            last_error: state.last_error.clone(),
        }
    }

    /// Warning at the threshold, critical from twice the threshold
    pub fn severity(&self) -> AlertSeverity {
        if self.consecutive_failures >= self.threshold.saturating_mul(2) {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        }
    }
}

// ============================================================================
// Failure Tracker
// ============================================================================

/// Keyed store of consecutive-failure state
#[derive(Debug)]
pub struct FailureTracker {
    threshold: u32,
    states: RwLock<HashMap<String, FailureState>>,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            states: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Replace tracked state with persisted state
    pub async fn restore(&self, states: Vec<FailureState>) {
        let mut map = self.states.write().await;
        map.clear();
        for state in states.into_iter().filter(|s| s.consecutive_failures > 0) {
            map.insert(state.source_id.clone(), state);
        }
    }

    /// Count a failed fetch; returns an alert once the threshold is reached
    pub async fn record_failure(&self, source_id: &str, error: &str) -> Option<FailureAlert> {
        self.record_failure_at(source_id, error, Utc::now()).await
    }

    /// Same as [`record_failure`](Self::record_failure) with an explicit timestamp
    pub async fn record_failure_at(
        &self,
        source_id: &str,
        error: &str,
        at: DateTime<Utc>,
    ) -> Option<FailureAlert> {
        let mut states = self.states.write().await;
        let state = states
            .entry(source_id.to_string())
            .or_insert_with(|| FailureState {
                source_id: source_id.to_string(),
                consecutive_failures: 0,
                first_failure_at: at,
                last_failure_at: at,
                last_error: String::new(),
            });

        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure_at = at;
        state.last_error = error.to_string();

        tracing::debug!(
            source = source_id,
            consecutive_failures = state.consecutive_failures,
            "Failure recorded"
        );

        (state.consecutive_failures >= self.threshold)
            .then(|| FailureAlert::from_state(state, self.threshold))
    }

    /// Clear a source's failures; true if it was in alert state
    pub async fn record_success(&self, source_id: &str) -> bool {
        match self.states.write().await.remove(source_id) {
            Some(state) => {
                let was_alerting = state.consecutive_failures >= self.threshold;
                if was_alerting {
                    tracing::info!(
                        source = source_id,
                        failures = state.consecutive_failures,
                        "Source recovered"
                    );
                }
                was_alerting
            }
            None => false,
        }
    }

    /// All sources at or above the threshold, ordered by id
    pub async fn pending_alerts(&self) -> Vec<FailureAlert> {
        let states = self.states.read().await;
        let mut alerts: Vec<FailureAlert> = states
            .values()
            .filter(|s| s.consecutive_failures >= self.threshold)
            .map(|s| FailureAlert::from_state(s, self.threshold))
            .collect();
        alerts.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        alerts
    }

    /// Current failure state of a source
    pub async fn state(&self, source_id: &str) -> Option<FailureState> {
        self.states.read().await.get(source_id).cloned()
    }

    /// Number of sources with at least one consecutive failure
    pub async fn failing_count(&self) -> usize {
        self.states.read().await.len()
    }
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_alert_at_threshold() {
        let tracker = FailureTracker::with_defaults();
        assert!(tracker.record_failure("a", "timeout").await.is_none());
        assert!(tracker.record_failure("a", "timeout").await.is_none());

        let alert = tracker.record_failure("a", "Server error: 503").await.unwrap();
        assert_eq!(alert.consecutive_failures, 3);
        assert_eq!(alert.last_error, "Server error: 503");
        assert_eq!(alert.severity(), AlertSeverity::Warning);
    }

    #[tokio::test]
    async fn test_alert_repeats_without_resetting() {
        let tracker = FailureTracker::new(2);
        tracker.record_failure("a", "e").await;
        let mut last = None;
        for expected in 2..=4 {
            let alert = tracker.record_failure("a", "e").await.unwrap();
            assert_eq!(alert.consecutive_failures, expected);
            last = Some(alert);
        }
        assert_eq!(last.unwrap().severity(), AlertSeverity::Critical);
    }

    #[tokio::test]
    async fn test_success_resets() {
        let tracker = FailureTracker::new(2);
        tracker.record_failure("a", "e").await;
        assert!(!tracker.record_success("a").await);
        assert!(tracker.state("a").await.is_none());

        tracker.record_failure("a", "e").await;
        tracker.record_failure("a", "e").await;
        assert!(tracker.record_success("a").await);
        assert!(tracker.pending_alerts().await.is_empty());

        assert!(tracker.record_failure("a", "e").await.is_none());
    }

    #[tokio::test]
    async fn test_sources_are_independent() {
        let tracker = FailureTracker::new(1);
        assert!(tracker.record_failure("a", "e").await.is_some());
        assert!(tracker.state("b").await.is_none());
        assert_eq!(tracker.failing_count().await, 1);
    }

    #[tokio::test]
    async fn test_first_failure_time_is_kept() {
        let tracker = FailureTracker::new(5);
        let first = Utc::now() - chrono::Duration::hours(8);
        tracker.record_failure_at("a", "e1", first).await;
        tracker.record_failure_at("a", "e2", Utc::now()).await;

        let state = tracker.state("a").await.unwrap();
        assert_eq!(state.first_failure_at, first);
        assert_eq!(state.last_error, "e2");
    }

    #[tokio::test]
    async fn test_restore() {
        let tracker = FailureTracker::new(3);
        let now = Utc::now();
        tracker
            .restore(vec![FailureState {
                source_id: "a".into(),
                consecutive_failures: 3,
                first_failure_at: now,
                last_failure_at: now,
                last_error: "404".into(),
            }])
            .await;

        assert_eq!(tracker.pending_alerts().await.len(), 1);
        let alert = tracker.record_failure("a", "404").await.unwrap();
        assert_eq!(alert.consecutive_failures, 4);
    }
}
