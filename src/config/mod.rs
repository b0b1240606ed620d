//! Configuration management for regwatch
//!
//! This module handles loading and validating configuration from a TOML
//! file, with a small set of environment variable overrides on top.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analytics::{AnalyzerConfig, KeywordLexicon, LexiconConfig};
use crate::error::Error;
use crate::crawler::fetcher::{FetcherConfig, DEFAULT_USER_AGENT};
use crate::llm::LlmConfig;
use crate::models::{ChannelDescriptor, ChannelKind, Priority, Source, Subscriber};
use crate::notifications::channels::email::EmailConfig;
use crate::notifications::channels::slack::SlackConfig;
use crate::notifications::channels::webhook::WebhookConfig;
use crate::parser::Normalizer;
use crate::utils::retry::{BackoffStrategy, RetryConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fetching and scheduling
    pub monitor: MonitorConfig,

    /// Change detection tunables
    pub detection: DetectionConfig,

    /// Keyword lexicon and hard triggers
    pub lexicon: LexiconConfig,

    /// Persistence
    pub storage: StorageConfig,

    /// Optional summarization service
    pub summarizer: LlmConfig,

    /// Delivery strategies and operator alerts
    pub delivery: DeliveryConfig,

    /// Prometheus textfile export
    pub metrics: MetricsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Monitored pages
    pub sources: Vec<SourceConfig>,

    /// Notification recipients
    pub subscribers: Vec<Subscriber>,
}

/// Fetch, retry and cycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Minimum interval between any two requests in milliseconds
    pub min_interval_ms: u64,

    /// Requests allowed back-to-back before the interval applies
    pub burst: u32,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Total fetch attempts per source and cycle
    pub max_attempts: u32,

    /// Base retry delay in milliseconds
    pub base_delay_ms: u64,

    /// Cap on a single retry delay in milliseconds
    pub max_delay_ms: u64,

    /// Retry delay growth
    pub backoff: BackoffStrategy,

    /// Sources checked concurrently
    pub workers: usize,

    /// Minutes between cycles in daemon mode
    pub cycle_interval_minutes: u64,

    /// Consecutive failures before the operator is alerted
    pub failure_threshold: u32,

    /// User agent string
    pub user_agent: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 2000,
            burst: 1,
            request_timeout_secs: 30,
            max_attempts: 3,
            base_delay_ms: 5000,
            max_delay_ms: 60_000,
            backoff: BackoffStrategy::Linear,
            workers: 1,
            cycle_interval_minutes: 60,
            failure_threshold: 3,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Change detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum change percentage that is significant on its own
    pub min_change_threshold: f64,

    /// Characters kept as snapshot excerpt
    pub excerpt_chars: usize,

    /// Context lines in the unified diff
    pub context_lines: usize,

    /// Cap on stored added/removed lines
    pub max_lines: usize,

    /// Cap on stored diff characters
    pub max_diff_chars: usize,

    /// Extra regex patterns removed before comparison
    pub ignore_patterns: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let analyzer = AnalyzerConfig::default();
        Self {
            min_change_threshold: analyzer.min_change_threshold,
            excerpt_chars: 5000,
            context_lines: analyzer.context_lines,
            max_lines: analyzer.max_lines,
            max_diff_chars: analyzer.max_diff_chars,
            ignore_patterns: Vec::new(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path; unset keeps state in memory only
    pub sqlite_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: Some(PathBuf::from("data/regwatch.db")),
        }
    }
}

/// Delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Channels tried in order for every notification
    pub strategies: Vec<ChannelKind>,

    pub webhook: WebhookConfig,

    pub slack: SlackConfig,

    pub email: EmailConfig,

    /// Where operational alerts go
    pub operator_targets: Vec<ChannelDescriptor>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            strategies: vec![
                ChannelKind::Webhook,
                ChannelKind::Slack,
                ChannelKind::Email,
                ChannelKind::Log,
            ],
            webhook: WebhookConfig::default(),
            slack: SlackConfig::default(),
            email: EmailConfig::default(),
            operator_targets: vec![ChannelDescriptor::new(ChannelKind::Log, "")],
        }
    }
}

/// Metrics export configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus textfile written after each daemon cycle
    pub textfile_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn default_interval_hours() -> u32 {
    4
}

fn default_priority() -> Priority {
    Priority::Medium
}

fn default_true() -> bool {
    true
}

/// One `[[sources]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_interval_hours")]
    pub check_interval_hours: u32,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    /// Only applied when the source is first registered
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub selector: Option<String>,
}

impl SourceConfig {
    pub fn into_source(self) -> Source {
        Source {
            check_interval_hours: self.check_interval_hours,
            priority: self.priority,
            active: self.active,
            selector: self.selector.filter(|s| !s.trim().is_empty()),
            ..Source::new(self.id, self.name, self.url, self.category)
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override settings from `REGWATCH_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("REGWATCH_SQLITE_PATH") {
            self.storage.sqlite_path = (!path.is_empty()).then(|| PathBuf::from(path));
        }

        if let Ok(level) = std::env::var("REGWATCH_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = std::env::var("REGWATCH_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(workers) = std::env::var("REGWATCH_WORKERS") {
            self.monitor.workers = workers
                .parse()
                .with_context(|| format!("REGWATCH_WORKERS is not a number: {workers}"))?;
        }

        if let Ok(endpoint) = std::env::var("REGWATCH_LLM_ENDPOINT") {
            self.summarizer.endpoint = endpoint;
            self.summarizer.enabled = true;
        }

        if let Ok(model) = std::env::var("REGWATCH_LLM_MODEL") {
            self.summarizer.model = model;
        }

        if let Ok(password) = std::env::var("REGWATCH_SMTP_PASSWORD") {
            self.delivery.email.password = Some(password);
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> crate::error::Result<()> {
        let monitor = &self.monitor;
        if monitor.max_attempts == 0 {
            return Err(Error::config("monitor.max_attempts must be greater than 0"));
        }
        if monitor.workers == 0 {
            return Err(Error::config("monitor.workers must be greater than 0"));
        }
        if monitor.failure_threshold == 0 {
            return Err(Error::config("monitor.failure_threshold must be greater than 0"));
        }
        if monitor.cycle_interval_minutes == 0 {
            return Err(Error::config(
                "monitor.cycle_interval_minutes must be greater than 0",
            ));
        }
        if monitor.request_timeout_secs == 0 {
            return Err(Error::config("monitor.request_timeout_secs must be greater than 0"));
        }

        if !(0.0..=100.0).contains(&self.detection.min_change_threshold) {
            return Err(Error::config(
                "detection.min_change_threshold must be between 0 and 100",
            ));
        }
        self.normalizer()
            .map_err(|e| Error::config(format!("detection.ignore_patterns: {e:#}")))?;
        self.keyword_lexicon()
            .map_err(|e| Error::config(format!("lexicon: {e:#}")))?;

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(Error::config("logging.format must be 'text' or 'json'"));
        }

        let mut ids = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(Error::config("source id must not be empty"));
            }
            if !ids.insert(source.id.as_str()) {
                return Err(Error::config(format!("duplicate source id: {}", source.id)));
            }
            validate_url(&source.url).map_err(|e| {
                Error::config(format!("source {} has an invalid url: {e:#}", source.id))
            })?;
            if source.check_interval_hours == 0 {
                return Err(Error::config(format!(
                    "source {}: check_interval_hours must be greater than 0",
                    source.id
                )));
            }
        }

        let delivery = &self.delivery;
        if delivery.strategies.is_empty() {
            return Err(Error::config("delivery.strategies must name at least one channel"));
        }
        delivery
            .webhook
            .validate()
            .map_err(|e| Error::config(format!("delivery.webhook: {e}")))?;
        if delivery.strategies.contains(&ChannelKind::Email) {
            delivery
                .email
                .validate()
                .map_err(|e| Error::config(format!("delivery.email: {e}")))?;
        }

        let mut ids = HashSet::new();
        for subscriber in &self.subscribers {
            if !ids.insert(subscriber.id.as_str()) {
                return Err(Error::config(format!("duplicate subscriber id: {}", subscriber.id)));
            }
            for channel in &subscriber.channels {
                if !delivery.strategies.contains(&channel.kind) {
                    return Err(Error::config(format!(
                        "subscriber {} uses channel '{}' which is not a delivery strategy",
                        subscriber.id, channel.kind
                    )));
                }
            }
        }

        Ok(())
    }

    /// Sources as domain values
    pub fn source_list(&self) -> Vec<Source> {
        self.sources.iter().cloned().map(SourceConfig::into_source).collect()
    }

    /// Retry policy for page fetches
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::with_delays(
            self.monitor.max_attempts,
            self.monitor.base_delay_ms,
            self.monitor.max_delay_ms,
        )
        .with_strategy(self.monitor.backoff)
    }

    /// Fetcher settings
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            min_interval_ms: self.monitor.min_interval_ms,
            burst: self.monitor.burst.max(1),
            timeout_secs: self.monitor.request_timeout_secs,
            user_agent: self.monitor.user_agent.clone(),
            retry: self.retry_config(),
        }
    }

    /// Analyzer settings
    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            min_change_threshold: self.detection.min_change_threshold,
            context_lines: self.detection.context_lines,
            max_lines: self.detection.max_lines,
            max_diff_chars: self.detection.max_diff_chars,
        }
    }

    /// Normalizer with the configured ignore patterns
    pub fn normalizer(&self) -> Result<Normalizer> {
        Normalizer::with_patterns(&self.detection.ignore_patterns)
            .context("Invalid pattern in detection.ignore_patterns")
    }

    /// Compiled keyword lexicon
    pub fn keyword_lexicon(&self) -> Result<KeywordLexicon> {
        KeywordLexicon::new(&self.lexicon).context("Invalid lexicon term")
    }

    /// Interval between daemon cycles
    #[must_use]
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.cycle_interval_minutes * 60)
    }
}

fn validate_url(raw: &str) -> Result<()> {
    let url = url::Url::parse(raw).with_context(|| format!("cannot parse '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("unsupported scheme '{}' in '{raw}'", url.scheme());
    }
    Ok(())
}
