use anyhow::Result;
use chrono::Utc;

use regwatch::config::Config;

use super::open_store;

/// Print store statistics and the most recent changes
pub async fn stats(config: Config, recent: usize) -> Result<()> {
    let repository = open_store(&config)?;
    let stats = repository.stats(Utc::now())?;

    println!("Monitor Statistics");
    println!("==================");
    println!("Sources: {} ({} active)", stats.sources_total, stats.sources_active);
    println!(
        "Snapshots: {} ({} in last 24h)",
        stats.snapshots_total, stats.snapshots_last_24h
    );
    println!(
        "Changes: {} ({} significant)",
        stats.changes_total, stats.changes_significant
    );
    println!("  Last 24h: {}", stats.changes_last_24h);
    println!("  Last 7d: {}", stats.changes_last_7d);
    println!(
        "Deliveries: {} ({} sent, {} failed)",
        stats.deliveries_total, stats.deliveries_sent, stats.deliveries_failed
    );
    println!("Failing sources: {}", stats.failing_sources);

    let changes = repository.list_changes(None, recent)?;
    if !changes.is_empty() {
        println!("\nRecent Changes");
        println!("--------------");
        for change in changes {
            println!(
                "{} [{}] {} {:.1}%{} - {}",
                change.detected_at.format("%Y-%m-%d %H:%M"),
                change.priority.as_str(),
                change.source_id,
                change.change_percent,
                if change.significant { " *" } else { "" },
                change.summary.title
            );
        }
    }

    Ok(())
}
