use anyhow::Result;
use std::time::Duration;

use regwatch::config::Config;
use regwatch::crawler::{CycleOptions, CycleOrchestrator, CycleReport};
use regwatch::scheduler::{
    run_daemon, shutdown_channel, wait_for_termination, DaemonConfig, ShutdownSignal,
};

use super::open_store;

/// Run a single cycle and print its report
pub async fn check(config: Config, all: bool, source: Option<String>) -> Result<()> {
    let repository = open_store(&config)?;
    let orchestrator = CycleOrchestrator::from_config(&config, repository)?;
    orchestrator.restore_failures().await?;

    let options = CycleOptions {
        all,
        only_source: source,
    };
    let report = orchestrator
        .run_cycle(&options, &ShutdownSignal::never())
        .await?;

    if let Some(path) = &config.metrics.textfile_path {
        regwatch::metrics::write_textfile(path)?;
    }

    print_report(&report);
    Ok(())
}

/// Run cycles until Ctrl-C or SIGTERM
pub async fn run(config: Config, interval_minutes: Option<u64>) -> Result<()> {
    let repository = open_store(&config)?;
    let orchestrator = CycleOrchestrator::from_config(&config, repository)?;
    orchestrator.restore_failures().await?;

    let interval = interval_minutes
        .map(|m| Duration::from_secs(m.max(1) * 60))
        .unwrap_or_else(|| config.cycle_interval());

    let (handle, signal) = shutdown_channel();
    tokio::spawn(async move {
        wait_for_termination().await;
        tracing::info!("Finishing current source before shutting down");
        handle.shutdown();
    });

    let mut daemon = DaemonConfig::new(interval);
    daemon.metrics_textfile = config.metrics.textfile_path.clone();

    println!("Monitoring {} sources every {} minutes", config.sources.len(), interval.as_secs() / 60);
    println!("Press Ctrl+C to stop");

    let summary = run_daemon(&orchestrator, &daemon, signal).await?;

    println!("\nDaemon Summary");
    println!("==============");
    println!("Cycles: {} ({} failed)", summary.cycles, summary.failed_cycles);
    println!("Changes recorded: {}", summary.changes_recorded);
    println!("Notifications sent: {}", summary.notifications_sent);
    Ok(())
}

fn print_report(report: &CycleReport) {
    println!("Cycle Summary");
    println!("=============");
    println!("Due: {}", report.sources_due);
    println!("Checked: {}", report.sources_checked);
    if report.sources_skipped > 0 {
        println!("Skipped (shutdown): {}", report.sources_skipped);
    }
    println!("First seen: {}", report.first_seen);
    println!("Unchanged: {}", report.unchanged + report.refreshed);
    println!(
        "Changes: {} ({} significant)",
        report.changes_recorded, report.significant_changes
    );
    println!("Fetch failures: {}", report.fetch_failures);
    for id in &report.failed_sources {
        println!("  - {id}");
    }
    if report.storage_errors > 0 {
        println!("Storage errors: {}", report.storage_errors);
    }
    println!("Summaries generated: {}", report.summaries_generated);
    println!("Alerts raised: {}", report.alerts_raised);
    println!(
        "Notifications: {} sent, {} failed",
        report.notifications_sent, report.notifications_failed
    );
    println!("Success rate: {:.1}%", report.success_rate() * 100.0);
    println!("Duration: {:.1}s", report.duration_ms as f64 / 1000.0);
}
