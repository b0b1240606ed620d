//! On-demand health check
//!
//! Fetches every active source once, reads the store statistics and alerts
//! the operator when anything fails. Snapshots and failure state are left
//! untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::crawler::fetcher::PageFetcher;
use crate::error::{Error, ErrorCategory, Result, WatchErrorTrait};
use crate::models::{ChannelDescriptor, Source, StoreStats};
use crate::notifications::{Alert, DeliveryDispatcher, Notification};
use crate::parser::HtmlTextExtractor;
use crate::storage::SharedSnapshotRepository;

/// Overall verdict of a health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
        }
    }
}

/// Reachability of one source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceHealth {
    pub source_id: String,
    pub url: String,
    pub reachable: bool,
    pub http_status: Option<u16>,
    pub response_time_ms: Option<u64>,
    pub error: Option<String>,
    pub category: Option<ErrorCategory>,
}

/// Store availability and its counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreHealth {
    pub available: bool,
    pub stats: Option<StoreStats>,
    pub error: Option<String>,
}

/// Result of one health check
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub checked_at: DateTime<Utc>,
    pub status: HealthStatus,
    pub sources: Vec<SourceHealth>,
    pub store: StoreHealth,
    /// Whether the operator alert went out; `None` when no alert was needed
    pub alert_delivered: Option<bool>,
}

impl HealthReport {
    pub fn reachable_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.reachable).count()
    }

    /// `"<component>: <error>"` for every failing component
    pub fn failed_components(&self) -> Vec<String> {
        let mut failed: Vec<String> = self
            .sources
            .iter()
            .filter(|s| !s.reachable)
            .map(|s| {
                format!(
                    "source {}: {}",
                    s.source_id,
                    s.error.as_deref().unwrap_or("unreachable")
                )
            })
            .collect();
        if let Some(error) = &self.store.error {
            failed.push(format!("store: {error}"));
        }
        failed
    }
}

/// Checks sources and the store on demand
pub struct HealthChecker {
    fetcher: PageFetcher,
    repository: SharedSnapshotRepository,
    dispatcher: DeliveryDispatcher,
    operator_targets: Vec<ChannelDescriptor>,
    /// Used when the store cannot list its sources
    configured_sources: Vec<Source>,
}

impl HealthChecker {
    pub fn new(
        fetcher: PageFetcher,
        repository: SharedSnapshotRepository,
        dispatcher: DeliveryDispatcher,
    ) -> Self {
        Self {
            fetcher,
            repository,
            dispatcher,
            operator_targets: Vec::new(),
            configured_sources: Vec::new(),
        }
    }

    /// Build from configuration; each source gets a single fetch attempt
    pub fn from_config(config: &Config, repository: SharedSnapshotRepository) -> Result<Self> {
        let mut fetcher_config = config.fetcher_config();
        fetcher_config.retry.max_attempts = 1;
        let fetcher = PageFetcher::with_components(
            &fetcher_config,
            Arc::new(HtmlTextExtractor::new()),
            config.normalizer()?,
        )?;
        let dispatcher = DeliveryDispatcher::from_config(&config.delivery)?;

        Ok(Self::new(fetcher, repository, dispatcher)
            .with_operator_targets(config.delivery.operator_targets.clone())
            .with_configured_sources(config.source_list()))
    }

    pub fn with_operator_targets(mut self, targets: Vec<ChannelDescriptor>) -> Self {
        self.operator_targets = targets;
        self
    }

    pub fn with_configured_sources(mut self, sources: Vec<Source>) -> Self {
        self.configured_sources = sources;
        self
    }

    /// Run the check and alert the operator when degraded
    pub async fn check(&self) -> HealthReport {
        let checked_at = Utc::now();
        let store = self.check_store(checked_at);

        let sources = match self.repository.list_sources() {
            Ok(sources) => sources,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot list sources, using configured list");
                self.configured_sources.clone()
            }
        };
        let active: Vec<Source> = sources.into_iter().filter(|s| s.active).collect();

        let sources =
            futures::future::join_all(active.iter().map(|source| self.check_source(source)))
                .await;

        let mut report = HealthReport {
            checked_at,
            status: HealthStatus::Healthy,
            sources,
            store,
            alert_delivered: None,
        };

        let failed = report.failed_components();
        if failed.is_empty() {
            tracing::info!(sources = report.sources.len(), "Health check passed");
            return report;
        }

        report.status = HealthStatus::Degraded;
        tracing::warn!(failed = failed.len(), "Health check degraded");

        let alert = Alert::health_check_failed(failed, report.store.available);
        let outcome = self
            .dispatcher
            .dispatch(&Notification::for_alert(&alert, &self.operator_targets))
            .await;
        report.alert_delivered = Some(outcome.succeeded());
        report
    }

    async fn check_source(&self, source: &Source) -> SourceHealth {
        match self.fetcher.fetch(&source.url, source.selector.as_deref()).await {
            Ok(page) => SourceHealth {
                source_id: source.id.clone(),
                url: source.url.clone(),
                reachable: true,
                http_status: Some(page.status),
                response_time_ms: Some(page.response_time_ms),
                error: None,
                category: None,
            },
            Err(e) => {
                tracing::warn!(source = %source.id, error = %e, "Source unreachable");
                SourceHealth {
                    source_id: source.id.clone(),
                    url: source.url.clone(),
                    reachable: false,
                    http_status: e.status(),
                    response_time_ms: None,
                    category: Some(WatchErrorTrait::category(&e)),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn check_store(&self, now: DateTime<Utc>) -> StoreHealth {
        match self.repository.stats(now) {
            Ok(stats) => StoreHealth {
                available: true,
                stats: Some(stats),
                error: None,
            },
            Err(e) => {
                let error = Error::from_storage(e);
                tracing::error!(error = %error, category = %error.category(), "Store check failed");
                StoreHealth {
                    available: false,
                    stats: None,
                    error: Some(error.to_string()),
                }
            }
        }
    }
}
