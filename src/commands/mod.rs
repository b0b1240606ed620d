pub mod analyze;
pub mod check;
pub mod health;
pub mod sources;
pub mod stats;

// Re-export command functions for convenience
pub use analyze::analyze;
pub use check::{check, run};
pub use health::health;
pub use sources::{set_active, sources};
pub use stats::stats;

use anyhow::{Context, Result};
use std::path::Path;

use regwatch::config::Config;
use regwatch::storage::{open_repository, SharedSnapshotRepository};

/// Load, override and validate the configuration
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        Config::from_file(path)?
    } else {
        tracing::warn!(path = %path.display(), "Config file not found, using defaults");
        Config::default()
    };
    config.apply_env_overrides()?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Open the store and register the configured sources
pub fn open_store(config: &Config) -> Result<SharedSnapshotRepository> {
    let repository = open_repository(config.storage.sqlite_path.as_deref())?;
    repository
        .sync_sources(&config.source_list())
        .context("Failed to register configured sources")?;
    Ok(repository)
}
