//! Common test utilities

#![allow(dead_code)]

use regwatch::config::{Config, SourceConfig};
use regwatch::crawler::fetcher::FetcherConfig;
use regwatch::crawler::CycleOrchestrator;
use regwatch::models::{ChannelKind, Priority, Subscriber};
use regwatch::storage::{create_memory_repository, SharedSnapshotRepository};
use regwatch::utils::retry::RetryConfig;

/// Page before an amendment
pub const PAGE_V1: &str = "Akvakultur\nForskrift om drift av akvakulturanlegg\ngrense 0.5";

/// Page after an amendment (keyword hit, significant)
pub const PAGE_V2: &str =
    "Akvakultur\nForskrift om drift av akvakulturanlegg\nny forskrift: grense 0.25, bot 1000000";

/// Fetcher settings without rate limiting and with millisecond backoff
pub fn fast_fetcher_config(max_attempts: u32) -> FetcherConfig {
    FetcherConfig {
        min_interval_ms: 0,
        burst: 1,
        timeout_secs: 2,
        user_agent: "regwatch-test".to_string(),
        retry: RetryConfig::with_delays(max_attempts, 10, 50),
    }
}

/// Source entry pointing at `url`
pub fn source(id: &str, url: String) -> SourceConfig {
    SourceConfig {
        id: id.to_string(),
        name: format!("Source {id}"),
        url,
        category: "licenses".to_string(),
        check_interval_hours: 4,
        priority: Priority::Medium,
        active: true,
        selector: None,
    }
}

/// Configuration tuned for tests: no rate limiting, fast retries, memory store
pub fn test_config(sources: Vec<SourceConfig>, subscribers: Vec<Subscriber>) -> Config {
    let mut config = Config::default();
    config.monitor.min_interval_ms = 0;
    config.monitor.request_timeout_secs = 2;
    config.monitor.max_attempts = 1;
    config.monitor.base_delay_ms = 10;
    config.monitor.max_delay_ms = 50;
    config.storage.sqlite_path = None;
    config.delivery.strategies = vec![ChannelKind::Webhook, ChannelKind::Log];
    config.delivery.webhook.max_attempts = 1;
    config.delivery.webhook.retry_delay_ms = 10;
    config.sources = sources;
    config.subscribers = subscribers;
    config
}

/// Memory store with the configured sources registered, plus its orchestrator
pub fn build(config: &Config) -> (SharedSnapshotRepository, CycleOrchestrator) {
    config.validate().unwrap();
    let repository = create_memory_repository();
    repository.sync_sources(&config.source_list()).unwrap();
    let orchestrator = CycleOrchestrator::from_config(config, repository.clone()).unwrap();
    (repository, orchestrator)
}
