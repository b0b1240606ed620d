// Core data structures for regwatch

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Priority of a source or a detected change
///
/// Variants are declared in ascending order so `Ord` follows
/// low < medium < high < critical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Create from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Get all priorities, lowest first
    pub fn all() -> [Self; 4] {
        [Self::Low, Self::Medium, Self::High, Self::Critical]
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A monitored page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub url: String,
    pub category: String,
    pub check_interval_hours: u32,
    pub priority: Priority,
    pub active: bool,
    /// CSS selector narrowing extraction to part of the page
    pub selector: Option<String>,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_changed: Option<DateTime<Utc>>,
}

impl Source {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            category: category.into(),
            check_interval_hours: 4,
            priority: Priority::Medium,
            active: true,
            selector: None,
            last_checked: None,
            last_changed: None,
        }
    }

    /// When the next check falls due, `None` if never checked
    pub fn next_check_at(&self) -> Option<DateTime<Utc>> {
        self.last_checked
            .map(|t| t + Duration::hours(i64::from(self.check_interval_hours)))
    }

    /// Whether this source should be checked at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && self.next_check_at().map_or(true, |next| now >= next)
    }
}

/// Stored capture of a source's extracted content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: i64,
    pub source_id: String,
    /// SHA-256 hex of the normalized text
    pub content_hash: String,
    pub excerpt: String,
    /// Full text; only retained on the current snapshot of a source
    pub content: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub http_status: u16,
    pub response_time_ms: u64,
}

/// Snapshot data before it is assigned an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSnapshot {
    pub source_id: String,
    pub content_hash: String,
    pub excerpt: String,
    pub content: String,
    pub captured_at: DateTime<Utc>,
    pub http_status: u16,
    pub response_time_ms: u64,
}

/// Where a change summary came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryOrigin {
    /// Built from the diff by the analyzer
    #[default]
    Analyzer,
    /// Produced by the external summarization service
    Service,
}

/// A concrete follow-up extracted from a change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub action: String,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

/// Human-readable description of a change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeSummary {
    pub title: String,
    /// Narrative in the source language (Norwegian)
    pub narrative: String,
    /// English narrative
    pub narrative_en: String,
    pub who_affected: Vec<String>,
    pub action_items: Vec<ActionItem>,
    pub deadlines: Vec<String>,
    /// Priority suggested by the summarizer; overrides the analyzer's
    pub priority_hint: Option<Priority>,
    pub origin: SummaryOrigin,
}

impl ChangeSummary {
    /// Summary used when no summarization service answered
    pub fn fallback(source_name: &str, analyzer_summary: &str) -> Self {
        Self {
            title: format!("Endring: {source_name}"),
            narrative: "Endringer oppdaget - se detaljer".to_string(),
            narrative_en: if analyzer_summary.is_empty() {
                "Changes detected - see details".to_string()
            } else {
                analyzer_summary.to_string()
            },
            who_affected: vec!["Akvakulturaktører".to_string()],
            action_items: Vec::new(),
            deadlines: Vec::new(),
            priority_hint: None,
            origin: SummaryOrigin::Analyzer,
        }
    }
}

/// Kind of difference in one document section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionChange {
    Replace,
    Delete,
    Insert,
}

/// A changed run of document sections, by section index in each version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedSection {
    #[serde(rename = "type")]
    pub change: SectionChange,
    /// Heading line of the section in the new version
    pub section: String,
    pub old_range: (usize, usize),
    pub new_range: (usize, usize),
}

/// A detected substantive change between two consecutive snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: String,
    pub source_id: String,
    pub source_name: String,
    pub source_url: String,
    pub category: String,
    pub previous_snapshot_id: Option<i64>,
    pub current_snapshot_id: Option<i64>,
    pub change_percent: f64,
    pub added_lines: Vec<String>,
    pub removed_lines: Vec<String>,
    pub diff_text: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub modified_sections: Vec<ModifiedSection>,
    pub priority: Priority,
    pub significant: bool,
    pub summary: ChangeSummary,
    pub detected_at: DateTime<Utc>,
}

/// Consecutive-failure bookkeeping for one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureState {
    pub source_id: String,
    pub consecutive_failures: u32,
    pub first_failure_at: DateTime<Utc>,
    pub last_failure_at: DateTime<Utc>,
    pub last_error: String,
}

/// How a subscriber wants matching changes delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// One notification per change
    #[default]
    Realtime,
    /// One notification per cycle holding every matching change
    #[serde(alias = "hourly", alias = "daily", alias = "weekly")]
    Digest,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Realtime => "realtime",
            Self::Digest => "digest",
        }
    }
}

/// Transport family a delivery target belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Webhook,
    Slack,
    Email,
    Log,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Slack => "slack",
            Self::Email => "email",
            Self::Log => "log",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One delivery target (URL, address, ...) of a subscriber
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub kind: ChannelKind,
    #[serde(default)]
    pub target: String,
}

impl ChannelDescriptor {
    pub fn new(kind: ChannelKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// A recipient of change notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Empty means every category
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub min_priority: Priority,
    /// Empty means no keyword restriction
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub delivery_mode: DeliveryMode,
    #[serde(default)]
    pub channels: Vec<ChannelDescriptor>,
}

impl Subscriber {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            active: true,
            categories: Vec::new(),
            min_priority: Priority::Low,
            keywords: Vec::new(),
            delivery_mode: DeliveryMode::Realtime,
            channels: Vec::new(),
        }
    }
}

/// Outcome recorded for one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Sent,
    Failed,
}

impl DeliveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// Row of the delivery log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryLogEntry {
    /// Subscriber id, or `operator` for operational alerts
    pub recipient: String,
    pub change_id: Option<String>,
    pub channel: String,
    pub status: DeliveryState,
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

/// Aggregate counters over the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub sources_total: u64,
    pub sources_active: u64,
    pub snapshots_total: u64,
    pub snapshots_last_24h: u64,
    pub changes_total: u64,
    pub changes_significant: u64,
    pub changes_last_24h: u64,
    pub changes_last_7d: u64,
    pub deliveries_total: u64,
    pub deliveries_sent: u64,
    pub deliveries_failed: u64,
    pub failing_sources: u64,
}
