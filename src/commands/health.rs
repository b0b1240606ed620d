use anyhow::{Context, Result};

use regwatch::config::Config;
use regwatch::crawler::{HealthChecker, HealthStatus};

use super::open_store;

/// Check sources and the store once; fails when the system is degraded
pub async fn health(config: Config, json: bool) -> Result<()> {
    let repository = open_store(&config)?;
    let checker = HealthChecker::from_config(&config, repository)
        .context("Failed to create health checker")?;
    let report = checker.check().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Health Check ({})", report.checked_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("============");
        println!("Status: {}", report.status.as_str().to_uppercase());
        println!(
            "Sources: {}/{} reachable",
            report.reachable_sources(),
            report.sources.len()
        );
        for source in report.sources.iter().filter(|s| !s.reachable) {
            println!(
                "  {} {} - {}",
                source.source_id,
                source.url,
                source.error.as_deref().unwrap_or("unreachable")
            );
        }
        match (&report.store.stats, &report.store.error) {
            (Some(stats), _) => println!(
                "Store: ok ({} sources, {} changes, {} snapshots)",
                stats.sources_total, stats.changes_total, stats.snapshots_total
            ),
            (None, Some(error)) => println!("Store: {error}"),
            (None, None) => println!("Store: unknown"),
        }
        if let Some(delivered) = report.alert_delivered {
            println!(
                "Operator alert: {}",
                if delivered { "sent" } else { "failed" }
            );
        }
    }

    if report.status == HealthStatus::Degraded {
        anyhow::bail!(
            "Health check degraded: {}",
            report.failed_components().join("; ")
        );
    }
    Ok(())
}
