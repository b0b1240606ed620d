//! Periodic cycle loop
//!
//! Runs a cycle, writes the metrics textfile, then sleeps until the next
//! tick or until shutdown is requested. A cycle in progress is allowed to
//! finish its current source before the loop exits.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::crawler::pipeline::{CycleOptions, CycleOrchestrator, CycleReport};
use crate::scheduler::shutdown::ShutdownSignal;

/// Settings for [`run_daemon`]
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Pause between the end of one cycle and the start of the next
    pub interval: Duration,
    /// Options applied to every cycle
    pub cycle: CycleOptions,
    /// node-exporter textfile refreshed after every cycle
    pub metrics_textfile: Option<PathBuf>,
    /// Stop after this many cycles; `None` runs until shutdown
    pub max_cycles: Option<u64>,
}

impl DaemonConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            cycle: CycleOptions::default(),
            metrics_textfile: None,
            max_cycles: None,
        }
    }
}

/// Totals over the daemon's lifetime
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DaemonSummary {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub changes_recorded: u64,
    pub notifications_sent: u64,
}

impl DaemonSummary {
    fn absorb(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.changes_recorded += report.changes_recorded;
        self.notifications_sent += report.notifications_sent;
    }
}

/// Run cycles until `shutdown` fires
///
/// A failing cycle is logged and retried at the next tick.
pub async fn run_daemon(
    orchestrator: &CycleOrchestrator,
    config: &DaemonConfig,
    mut shutdown: ShutdownSignal,
) -> Result<DaemonSummary> {
    let mut summary = DaemonSummary::default();

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        "Monitoring daemon started"
    );

    loop {
        match orchestrator.run_cycle(&config.cycle, &shutdown).await {
            Ok(report) => summary.absorb(&report),
            Err(e) => {
                summary.failed_cycles += 1;
                tracing::error!(error = %e, "Monitoring cycle failed");
            }
        }

        if let Some(path) = &config.metrics_textfile {
            if let Err(e) = crate::metrics::write_textfile(path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to write metrics textfile");
            }
        }

        let limit_reached = config
            .max_cycles
            .is_some_and(|max| summary.cycles + summary.failed_cycles >= max);
        if limit_reached || shutdown.is_shutdown() {
            break;
        }

        tracing::debug!(sleep_secs = config.interval.as_secs(), "Waiting for next cycle");
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            _ = shutdown.wait() => {
                tracing::info!("Shutdown requested while idle");
                break;
            }
        }
    }

    tracing::info!(
        cycles = summary.cycles,
        failed_cycles = summary.failed_cycles,
        changes = summary.changes_recorded,
        "Monitoring daemon stopped"
    );

    Ok(summary)
}
