//! Prometheus metrics for the monitoring cycle
//!
//! This module provides metrics tracking for:
//! - Fetches by outcome
//! - Detected changes by significance
//! - Deliveries by channel and result
//! - Cycle duration and currently failing sources
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use anyhow::Context;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, CounterVec, Encoder, Gauge,
    Histogram, TextEncoder,
};
use std::path::Path;
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all monitor metrics
struct MonitorMetrics {
    fetches: CounterVec,
    changes: CounterVec,
    deliveries: CounterVec,
    cycle_duration: Histogram,
    failing_sources: Gauge,
}

/// Global storage for monitor metrics
static MONITOR_METRICS: OnceLock<MonitorMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// If metric registration fails, errors are logged by the caller and
/// subsequent metric operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = regwatch::metrics::init_metrics() {
///     tracing::warn!(error = %e, "Metrics initialization failed");
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = MonitorMetrics {
        fetches: register_counter_vec!(
            "regwatch_fetches_total",
            "Page fetches by outcome",
            &["outcome"]
        )?,
        changes: register_counter_vec!(
            "regwatch_changes_total",
            "Detected changes by significance",
            &["significant"]
        )?,
        deliveries: register_counter_vec!(
            "regwatch_deliveries_total",
            "Delivery attempts by channel and result",
            &["channel", "result"]
        )?,
        cycle_duration: register_histogram!(
            "regwatch_cycle_duration_seconds",
            "Duration of one monitoring cycle in seconds",
            vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]
        )?,
        failing_sources: register_gauge!(
            "regwatch_failing_sources",
            "Sources with at least one consecutive fetch failure"
        )?,
    };

    MONITOR_METRICS
        .set(metrics)
        .map_err(|_| "Monitor metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Write the current metrics to a node-exporter textfile
///
/// The file is written next to its destination and renamed into place so
/// the exporter never reads a partial file.
pub fn write_textfile(path: &Path) -> anyhow::Result<()> {
    let text = gather_metrics().map_err(|e| anyhow::anyhow!("Failed to encode metrics: {e}"))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, text).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move metrics into {}", path.display()))?;
    Ok(())
}

/// Record a fetch outcome (`changed`, `unchanged`, `first_seen`, `failed`)
pub fn record_fetch(outcome: &str) {
    if let Some(m) = MONITOR_METRICS.get() {
        m.fetches.with_label_values(&[outcome]).inc();
    }
}

/// Record a detected change
pub fn record_change(significant: bool) {
    if let Some(m) = MONITOR_METRICS.get() {
        let label = if significant { "true" } else { "false" };
        m.changes.with_label_values(&[label]).inc();
    }
}

/// Record one delivery attempt
pub fn record_delivery(channel: &str, success: bool) {
    if let Some(m) = MONITOR_METRICS.get() {
        let result = if success { "sent" } else { "failed" };
        m.deliveries.with_label_values(&[channel, result]).inc();
    }
}

/// Record the duration of a finished cycle
pub fn observe_cycle(duration_secs: f64) {
    if let Some(m) = MONITOR_METRICS.get() {
        m.cycle_duration.observe(duration_secs);
    }
}

/// Update the failing-sources gauge
pub fn set_failing_sources(count: usize) {
    if let Some(m) = MONITOR_METRICS.get() {
        m.failing_sources.set(count as f64);
    }
}

// ============================================================================
// Tests
// ============================================================================
