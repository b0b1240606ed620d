use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;

use regwatch::config::Config;

use super::open_store;

/// List sources with their due status and failure state
pub async fn sources(config: Config) -> Result<()> {
    let repository = open_store(&config)?;
    let now = Utc::now();
    let failures: HashMap<String, _> = repository
        .load_failure_states()?
        .into_iter()
        .map(|state| (state.source_id.clone(), state))
        .collect();

    println!(
        "{:<28} {:<8} {:<8} {:<6} {:<20} {}",
        "ID", "PRIORITY", "ACTIVE", "DUE", "LAST CHECKED", "FAILURES"
    );

    for source in repository.list_sources()? {
        let last_checked = source
            .last_checked
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        let failing = failures
            .get(&source.id)
            .map(|f| format!("{} ({})", f.consecutive_failures, f.last_error))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<28} {:<8} {:<8} {:<6} {:<20} {}",
            source.id,
            source.priority.as_str(),
            if source.active { "yes" } else { "no" },
            if source.is_due(now) { "yes" } else { "no" },
            last_checked,
            failing
        );
    }

    Ok(())
}

/// Activate or deactivate a source
pub async fn set_active(config: Config, id: String, active: bool) -> Result<()> {
    let repository = open_store(&config)?;
    if !repository.set_source_active(&id, active)? {
        anyhow::bail!("Unknown source: {id}");
    }

    tracing::info!(source = %id, active, "Source activation changed");
    println!(
        "Source {id} {}",
        if active { "enabled" } else { "disabled" }
    );
    Ok(())
}
