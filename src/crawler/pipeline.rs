//! One monitoring cycle over the due sources
//!
//! This module wires the fetcher, the snapshot store, the change analyzer,
//! the failure tracker and notification delivery into a single pass.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐     ┌─────────────┐
//! │    Due      │     │  SourceChecker  │     │   Router    │     │ Dispatcher  │
//! │   sources   │────▶│  workers (1..N) │────▶│ (per cycle) │────▶│ (strategies)│
//! └─────────────┘     └─────────────────┘     └─────────────┘     └─────────────┘
//!       │                     │                                          │
//!  mpsc channel        commit per source                          delivery_log
//!       │                     │                                          │
//!       └─────────────────────┴──────────────────────────────────────────┘
//!                                    │
//!                               CycleReport
//! ```
//!
//! Each source's state transition is committed on its own as soon as its
//! check finishes. Shutdown is observed between sources; a check already in
//! flight always completes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::analytics::{ChangeAnalysis, ChangeAnalyzer};
use crate::config::Config;
use crate::crawler::fetcher::{FetchedPage, PageFetcher};
use crate::error::WatchErrorTrait;
use crate::llm::{LlmSummarizer, SummarizeError, Summarizer, SummaryRequest};
use crate::models::{ChangeRecord, ChangeSummary, ChannelDescriptor, NewSnapshot, Source, Subscriber};
use crate::notifications::{
    Alert, DeliveryDispatcher, DeliveryOutcome, Notification, NotificationRouter,
};
use crate::parser::HtmlTextExtractor;
use crate::scheduler::health::{FailureAlert, FailureTracker};
use crate::scheduler::shutdown::ShutdownSignal;
use crate::storage::{SharedSnapshotRepository, SourceCommit};
use crate::utils::error::FetchError;
use crate::utils::take_chars;

// ============================================================================
// Per-source checks
// ============================================================================

/// What happened to one source in a cycle
#[derive(Debug, Clone)]
pub enum SourceOutcome {
    /// First snapshot stored, nothing to compare against
    FirstSeen,
    /// Content hash equal to the stored one
    Unchanged,
    /// Hash changed but the texts are equal after normalization
    Refreshed,
    /// A change was recorded
    Changed(Box<ChangeRecord>),
    /// Fetch failed after all attempts
    Failed {
        error: String,
        alert: Option<FailureAlert>,
    },
}

/// Result of checking one source
#[derive(Debug, Clone)]
pub struct SourceCheck {
    pub source_id: String,
    pub outcome: SourceOutcome,
    /// Source was in alert state and fetched successfully again
    pub recovered: bool,
    /// Summary came from the summarization service
    pub summarized: bool,
}

/// Checks a single source and commits the resulting state transition
pub struct SourceChecker {
    fetcher: PageFetcher,
    analyzer: ChangeAnalyzer,
    repository: SharedSnapshotRepository,
    tracker: Arc<FailureTracker>,
    summarizer: Option<Arc<dyn Summarizer>>,
    excerpt_chars: usize,
}

impl SourceChecker {
    pub fn new(
        fetcher: PageFetcher,
        analyzer: ChangeAnalyzer,
        repository: SharedSnapshotRepository,
        tracker: Arc<FailureTracker>,
    ) -> Self {
        Self {
            fetcher,
            analyzer,
            repository,
            tracker,
            summarizer: None,
            excerpt_chars: 5000,
        }
    }

    /// Use a summarization service for significant changes
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn with_excerpt_chars(mut self, excerpt_chars: usize) -> Self {
        self.excerpt_chars = excerpt_chars;
        self
    }

    pub fn tracker(&self) -> &Arc<FailureTracker> {
        &self.tracker
    }

    /// Fetch `source`, compare with the stored snapshot and commit
    ///
    /// Fetch failures are part of the outcome; only storage errors are
    /// returned as `Err`.
    pub async fn check(&self, source: &Source) -> Result<SourceCheck> {
        let started = Utc::now();

        let page = match self
            .fetcher
            .fetch(&source.url, source.selector.as_deref())
            .await
        {
            Ok(page) => page,
            Err(e) => return self.handle_failure(source, &e, started).await,
        };

        let recovered = self.tracker.record_success(&source.id).await;
        let checked_at = page.fetched_at;
        let current = self
            .repository
            .current_snapshot(&source.id)
            .context("Failed to load current snapshot")?;

        let (outcome, summarized) = match current {
            None => {
                self.commit(source, checked_at, Some(self.new_snapshot(source, &page)), None)?;
                tracing::info!(source = %source.id, "First snapshot stored");
                (SourceOutcome::FirstSeen, false)
            }
            Some(previous) if previous.content_hash == page.content_hash => {
                self.commit(source, checked_at, None, None)?;
                tracing::debug!(source = %source.id, "Content unchanged");
                (SourceOutcome::Unchanged, false)
            }
            Some(previous) => {
                let old_text = previous.content.as_deref().unwrap_or(&previous.excerpt);
                let analysis = self.analyzer.analyze(old_text, &page.text);
                let snapshot = Some(self.new_snapshot(source, &page));

                if !analysis.has_changes {
                    self.commit(source, checked_at, snapshot, None)?;
                    tracing::debug!(source = %source.id, "Only volatile content changed");
                    (SourceOutcome::Refreshed, false)
                } else {
                    let (summary, summarized) =
                        self.summarize(source, old_text, &page.text, &analysis).await;
                    let record = self.analyzer.build_record(
                        source,
                        Some(&previous),
                        &analysis,
                        summary,
                        checked_at,
                    );
                    let stored = self
                        .commit(source, checked_at, snapshot, Some(record.clone()))?
                        .unwrap_or(record);

                    tracing::info!(
                        source = %source.id,
                        change_percent = stored.change_percent,
                        priority = stored.priority.as_str(),
                        significant = stored.significant,
                        keywords = stored.keywords.len(),
                        "Change detected"
                    );
                    crate::metrics::record_change(stored.significant);
                    (SourceOutcome::Changed(Box::new(stored)), summarized)
                }
            }
        };

        crate::metrics::record_fetch(match outcome {
            SourceOutcome::FirstSeen => "first_seen",
            SourceOutcome::Changed(_) => "changed",
            _ => "unchanged",
        });

        Ok(SourceCheck {
            source_id: source.id.clone(),
            outcome,
            recovered,
            summarized,
        })
    }

    async fn handle_failure(
        &self,
        source: &Source,
        error: &FetchError,
        at: DateTime<Utc>,
    ) -> Result<SourceCheck> {
        let message = error.to_string();
        let alert = self.tracker.record_failure_at(&source.id, &message, at).await;
        if let Some(state) = self.tracker.state(&source.id).await {
            self.repository
                .commit_failure(&state, at)
                .context("Failed to persist failure state")?;
        }

        tracing::warn!(
            source = %source.id,
            url = %source.url,
            error = %message,
            category = %error.category(),
            alerting = alert.is_some(),
            "Fetch failed"
        );
        crate::metrics::record_fetch("failed");

        Ok(SourceCheck {
            source_id: source.id.clone(),
            outcome: SourceOutcome::Failed {
                error: message,
                alert,
            },
            recovered: false,
            summarized: false,
        })
    }

    fn new_snapshot(&self, source: &Source, page: &FetchedPage) -> NewSnapshot {
        NewSnapshot {
            source_id: source.id.clone(),
            content_hash: page.content_hash.clone(),
            excerpt: take_chars(&page.text, self.excerpt_chars),
            content: page.text.clone(),
            captured_at: page.fetched_at,
            http_status: page.status,
            response_time_ms: page.response_time_ms,
        }
    }

    fn commit(
        &self,
        source: &Source,
        checked_at: DateTime<Utc>,
        snapshot: Option<NewSnapshot>,
        change: Option<ChangeRecord>,
    ) -> Result<Option<ChangeRecord>> {
        let result = self
            .repository
            .commit_success(SourceCommit {
                source_id: source.id.clone(),
                checked_at,
                snapshot,
                change,
            })
            .with_context(|| format!("Failed to commit check of {}", source.id))?;
        Ok(result.change)
    }

    /// Service summary for significant changes, analyzer fallback otherwise
    async fn summarize(
        &self,
        source: &Source,
        old_text: &str,
        new_text: &str,
        analysis: &ChangeAnalysis,
    ) -> (ChangeSummary, bool) {
        let fallback = || ChangeSummary::fallback(&source.name, &analysis.summary);

        let Some(summarizer) = self.summarizer.as_ref().filter(|_| analysis.significant) else {
            return (fallback(), false);
        };

        let request = SummaryRequest {
            source_name: source.name.clone(),
            source_url: source.url.clone(),
            category: source.category.clone(),
            old_content: old_text.to_string(),
            new_content: new_text.to_string(),
            diff_summary: analysis.summary.clone(),
            keywords: analysis.keywords.clone(),
        };

        match summarizer.summarize(&request).await {
            Ok(summary) => (summary, true),
            Err(e) => {
                let error = crate::error::Error::from(e);
                tracing::warn!(
                    source = %source.id,
                    summarizer = summarizer.name(),
                    category = %error.category(),
                    error = %error,
                    "Summarization failed, using analyzer summary"
                );
                (fallback(), false)
            }
        }
    }
}

// ============================================================================
// Cycle Statistics
// ============================================================================

/// Cycle counters (thread-safe)
#[derive(Debug, Default)]
struct CycleStats {
    checked: AtomicU64,
    first_seen: AtomicU64,
    unchanged: AtomicU64,
    refreshed: AtomicU64,
    changes_recorded: AtomicU64,
    significant_changes: AtomicU64,
    fetch_failures: AtomicU64,
    storage_errors: AtomicU64,
    summaries_generated: AtomicU64,
}

impl CycleStats {
    fn record(&self, check: &SourceCheck) {
        self.checked.fetch_add(1, Ordering::Relaxed);
        if check.summarized {
            self.summaries_generated.fetch_add(1, Ordering::Relaxed);
        }
        let counter = match &check.outcome {
            SourceOutcome::FirstSeen => &self.first_seen,
            SourceOutcome::Unchanged => &self.unchanged,
            SourceOutcome::Refreshed => &self.refreshed,
            SourceOutcome::Changed(record) => {
                if record.significant {
                    self.significant_changes.fetch_add(1, Ordering::Relaxed);
                }
                &self.changes_recorded
            }
            SourceOutcome::Failed { .. } => &self.fetch_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_storage_error(&self) {
        self.checked.fetch_add(1, Ordering::Relaxed);
        self.storage_errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// Summary of one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    /// Sources selected for this cycle
    pub sources_due: u64,
    pub sources_checked: u64,
    /// Due sources left unchecked because of shutdown
    pub sources_skipped: u64,
    pub first_seen: u64,
    pub unchanged: u64,
    /// Hash changed, normalized text did not
    pub refreshed: u64,
    pub changes_recorded: u64,
    pub significant_changes: u64,
    pub fetch_failures: u64,
    pub storage_errors: u64,
    pub summaries_generated: u64,
    pub alerts_raised: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub cancelled: bool,
    /// Ids of sources whose fetch failed
    pub failed_sources: Vec<String>,
}

impl CycleReport {
    fn from_stats(stats: &CycleStats) -> Self {
        Self {
            sources_checked: stats.checked.load(Ordering::Relaxed),
            first_seen: stats.first_seen.load(Ordering::Relaxed),
            unchanged: stats.unchanged.load(Ordering::Relaxed),
            refreshed: stats.refreshed.load(Ordering::Relaxed),
            changes_recorded: stats.changes_recorded.load(Ordering::Relaxed),
            significant_changes: stats.significant_changes.load(Ordering::Relaxed),
            fetch_failures: stats.fetch_failures.load(Ordering::Relaxed),
            storage_errors: stats.storage_errors.load(Ordering::Relaxed),
            summaries_generated: stats.summaries_generated.load(Ordering::Relaxed),
            ..Default::default()
        }
    }

    /// Share of checked sources that fetched successfully (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.sources_checked == 0 {
            return 1.0;
        }
        let failed = self.fetch_failures + self.storage_errors;
        (self.sources_checked - failed.min(self.sources_checked)) as f64
            / self.sources_checked as f64
    }
}

// ============================================================================
// Cycle Orchestrator
// ============================================================================

/// Which sources a cycle covers
#[derive(Debug, Clone, Default)]
pub struct CycleOptions {
    /// Check every active source regardless of its interval
    pub all: bool,
    /// Restrict the cycle to one source
    pub only_source: Option<String>,
}

/// Runs monitoring cycles
pub struct CycleOrchestrator {
    checker: Arc<SourceChecker>,
    repository: SharedSnapshotRepository,
    router: NotificationRouter,
    dispatcher: DeliveryDispatcher,
    subscribers: Vec<Subscriber>,
    operator_targets: Vec<ChannelDescriptor>,
    workers: usize,
}

impl CycleOrchestrator {
    pub fn new(
        checker: SourceChecker,
        dispatcher: DeliveryDispatcher,
        subscribers: Vec<Subscriber>,
    ) -> Self {
        let repository = Arc::clone(&checker.repository);
        Self {
            checker: Arc::new(checker),
            repository,
            router: NotificationRouter::new(),
            dispatcher,
            subscribers,
            operator_targets: Vec::new(),
            workers: 1,
        }
    }

    /// Assemble the full pipeline from configuration
    ///
    /// The summarizer is only attached when enabled; delivery channels are
    /// built in the configured strategy order.
    pub fn from_config(config: &Config, repository: SharedSnapshotRepository) -> Result<Self> {
        let fetcher = PageFetcher::with_components(
            &config.fetcher_config(),
            Arc::new(HtmlTextExtractor::new()),
            config.normalizer()?,
        )
        .context("Failed to create page fetcher")?;
        let analyzer = ChangeAnalyzer::new(
            config.normalizer()?,
            config.keyword_lexicon()?,
            config.analyzer_config(),
        );
        let tracker = Arc::new(FailureTracker::new(config.monitor.failure_threshold));

        let mut checker = SourceChecker::new(fetcher, analyzer, repository, tracker)
            .with_excerpt_chars(config.detection.excerpt_chars);
        match LlmSummarizer::new(config.summarizer.clone()) {
            Ok(summarizer) => {
                tracing::info!(model = %config.summarizer.model, "Summarizer enabled");
                checker = checker.with_summarizer(Arc::new(summarizer));
            }
            Err(SummarizeError::Disabled) => {
                tracing::debug!("Summarizer disabled, using analyzer summaries");
            }
            Err(e) => return Err(e).context("Failed to create summarizer"),
        }

        let dispatcher = DeliveryDispatcher::from_config(&config.delivery)
            .context("Failed to create delivery channels")?;
        tracing::info!(strategies = ?dispatcher.strategy_names(), "Delivery strategies ready");

        Ok(Self::new(checker, dispatcher, config.subscribers.clone())
            .with_operator_targets(config.delivery.operator_targets.clone())
            .with_workers(config.monitor.workers))
    }

    /// Targets for operational alerts
    pub fn with_operator_targets(mut self, targets: Vec<ChannelDescriptor>) -> Self {
        self.operator_targets = targets;
        self
    }

    /// Number of sources checked concurrently
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn tracker(&self) -> &Arc<FailureTracker> {
        self.checker.tracker()
    }

    /// Restore failure counts persisted by earlier runs
    pub async fn restore_failures(&self) -> Result<()> {
        let states = self.repository.load_failure_states()?;
        tracing::debug!(failing = states.len(), "Failure state restored");
        self.tracker().restore(states).await;
        for alert in self.tracker().pending_alerts().await {
            tracing::warn!(
                source = %alert.source_id,
                failures = alert.consecutive_failures,
                "Source still failing from previous run"
            );
        }
        Ok(())
    }

    /// Sources this cycle should check
    fn select_sources(&self, options: &CycleOptions, now: DateTime<Utc>) -> Result<Vec<Source>> {
        if let Some(id) = &options.only_source {
            if self.repository.get_source(id)?.is_none() {
                anyhow::bail!("Unknown source: {id}");
            }
        }

        let sources = if options.all {
            self.repository
                .list_sources()?
                .into_iter()
                .filter(|s| s.active)
                .collect()
        } else {
            self.repository.due_sources(now)?
        };

        Ok(sources
            .into_iter()
            .filter(|s| options.only_source.as_ref().map_or(true, |id| &s.id == id))
            .collect())
    }

    /// Run one cycle
    ///
    /// Per-source errors are counted in the report; only failing to read
    /// the source list is returned as an error.
    pub async fn run_cycle(
        &self,
        options: &CycleOptions,
        shutdown: &ShutdownSignal,
    ) -> Result<CycleReport> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let sources = self.select_sources(options, started_at)?;
        let due = sources.len() as u64;

        tracing::info!(
            due = due,
            workers = self.workers,
            all = options.all,
            "Starting monitoring cycle"
        );

        let stats = CycleStats::default();
        let checks = if self.workers > 1 && sources.len() > 1 {
            self.check_concurrently(sources, shutdown, &stats).await
        } else {
            self.check_sequentially(sources, shutdown, &stats).await
        };

        let mut report = CycleReport::from_stats(&stats);
        report.started_at = Some(started_at);
        report.sources_due = due;
        report.sources_skipped = due.saturating_sub(report.sources_checked);
        report.cancelled = report.sources_skipped > 0 && shutdown.is_shutdown();

        // Operational alerts
        let mut alerts = Vec::new();
        let mut changes = Vec::new();
        let checked: HashSet<String> = checks.iter().map(|c| c.source_id.clone()).collect();
        for check in checks {
            if check.recovered {
                alerts.push(Alert::source_recovered(&check.source_id));
            }
            match check.outcome {
                SourceOutcome::Changed(record) => changes.push(*record),
                SourceOutcome::Failed { alert, .. } => {
                    report.failed_sources.push(check.source_id);
                    if let Some(failure) = alert {
                        report.alerts_raised += 1;
                        alerts.push(Alert::source_failure(&failure));
                    }
                }
                _ => {}
            }
        }
        report.failed_sources.sort();

        // Sources not checked this cycle still alert while at or above threshold
        for failure in self.unchecked_alerts(options, &checked).await? {
            report.alerts_raised += 1;
            alerts.push(Alert::source_failure(&failure));
        }

        // Operator alerts are dispatched concurrently
        let alert_notifications: Vec<Notification> = alerts
            .iter()
            .map(|alert| Notification::for_alert(alert, &self.operator_targets))
            .collect();
        let outcomes = futures::future::join_all(
            alert_notifications
                .iter()
                .map(|notification| self.dispatcher.dispatch(notification)),
        )
        .await;
        for outcome in outcomes {
            self.record_outcome(&outcome, &mut report);
        }

        // Subscriber notifications; only significant changes are routed
        let significant: Vec<ChangeRecord> = changes.into_iter().filter(|c| c.significant).collect();
        for plan in self.router.route_cycle(&significant, &self.subscribers) {
            let notification = Notification::for_plan(&plan);
            self.deliver(&notification, &mut report).await;
        }

        report.duration_ms = timer.elapsed().as_millis() as u64;
        crate::metrics::observe_cycle(timer.elapsed().as_secs_f64());
        crate::metrics::set_failing_sources(self.tracker().failing_count().await);

        tracing::info!(
            checked = report.sources_checked,
            changes = report.changes_recorded,
            significant = report.significant_changes,
            failures = report.fetch_failures,
            sent = report.notifications_sent,
            failed_deliveries = report.notifications_failed,
            cancelled = report.cancelled,
            duration_ms = report.duration_ms,
            "Monitoring cycle completed"
        );

        Ok(report)
    }

    /// Pending failure alerts of active sources this cycle did not fetch
    async fn unchecked_alerts(
        &self,
        options: &CycleOptions,
        checked: &HashSet<String>,
    ) -> Result<Vec<FailureAlert>> {
        let pending = self.tracker().pending_alerts().await;
        if pending.is_empty() {
            return Ok(pending);
        }

        let active: HashSet<String> = self
            .repository
            .list_sources()?
            .into_iter()
            .filter(|s| s.active)
            .map(|s| s.id)
            .collect();

        Ok(pending
            .into_iter()
            .filter(|a| !checked.contains(&a.source_id) && active.contains(&a.source_id))
            .filter(|a| options.only_source.as_ref().map_or(true, |id| &a.source_id == id))
            .inspect(|a| {
                tracing::warn!(
                    source = %a.source_id,
                    failures = a.consecutive_failures,
                    "Source not due but still failing"
                );
            })
            .collect())
    }

    async fn deliver(&self, notification: &Notification, report: &mut CycleReport) {
        let outcome = self.dispatcher.dispatch(notification).await;
        self.record_outcome(&outcome, report);
    }

    fn record_outcome(&self, outcome: &DeliveryOutcome, report: &mut CycleReport) {
        if outcome.succeeded() {
            report.notifications_sent += 1;
        } else {
            report.notifications_failed += 1;
        }

        for entry in outcome.log_entries(Utc::now()) {
            if let Err(e) = self.repository.log_delivery(&entry) {
                tracing::error!(
                    recipient = %entry.recipient,
                    error = %e,
                    "Failed to write delivery log"
                );
            }
        }
    }

    async fn check_sequentially(
        &self,
        sources: Vec<Source>,
        shutdown: &ShutdownSignal,
        stats: &CycleStats,
    ) -> Vec<SourceCheck> {
        let mut checks = Vec::with_capacity(sources.len());
        for source in sources {
            if shutdown.is_shutdown() {
                tracing::info!("Shutdown requested, stopping cycle between sources");
                break;
            }
            if let Some(check) = run_check(&self.checker, &source, stats).await {
                checks.push(check);
            }
        }
        checks
    }

    async fn check_concurrently(
        &self,
        sources: Vec<Source>,
        shutdown: &ShutdownSignal,
        stats: &CycleStats,
    ) -> Vec<SourceCheck> {
        let (source_tx, source_rx) = mpsc::channel::<Source>(sources.len());
        let (result_tx, mut result_rx) = mpsc::channel::<Option<SourceCheck>>(sources.len());

        // Queue everything up front; workers stop pulling on shutdown
        for source in sources {
            if source_tx.send(source).await.is_err() {
                break;
            }
        }
        drop(source_tx);

        let handles = self.spawn_workers(source_rx, result_tx, shutdown.clone());

        let mut checks = Vec::new();
        while let Some(result) = result_rx.recv().await {
            match result {
                Some(check) => {
                    stats.record(&check);
                    checks.push(check);
                }
                None => stats.record_storage_error(),
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Source worker panicked");
            }
        }

        checks
    }

    fn spawn_workers(
        &self,
        source_rx: mpsc::Receiver<Source>,
        result_tx: mpsc::Sender<Option<SourceCheck>>,
        shutdown: ShutdownSignal,
    ) -> Vec<JoinHandle<()>> {
        let source_rx = Arc::new(tokio::sync::Mutex::new(source_rx));
        let mut handles = Vec::with_capacity(self.workers);

        for worker_id in 0..self.workers {
            let source_rx = Arc::clone(&source_rx);
            let result_tx = result_tx.clone();
            let checker = Arc::clone(&self.checker);
            let shutdown = shutdown.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    if shutdown.is_shutdown() {
                        tracing::debug!(worker_id, "Shutdown requested, worker stopping");
                        break;
                    }

                    let source = {
                        let mut rx = source_rx.lock().await;
                        rx.recv().await
                    };
                    let Some(source) = source else {
                        break; // Queue drained
                    };

                    tracing::debug!(worker_id, source = %source.id, "Checking source");
                    let result = match checker.check(&source).await {
                        Ok(check) => Some(check),
                        Err(e) => {
                            tracing::error!(source = %source.id, error = %e, "Source check failed");
                            None
                        }
                    };

                    if result_tx.send(result).await.is_err() {
                        break;
                    }
                }
            }));
        }

        handles
    }
}

async fn run_check(
    checker: &SourceChecker,
    source: &Source,
    stats: &CycleStats,
) -> Option<SourceCheck> {
    match checker.check(source).await {
        Ok(check) => {
            stats.record(&check);
            Some(check)
        }
        Err(e) => {
            tracing::error!(source = %source.id, error = %e, "Source check failed");
            stats.record_storage_error();
            None
        }
    }
}
