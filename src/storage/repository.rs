//! Repository Pattern for Snapshot Storage
//!
//! This module provides the trait-based store that owns every per-source
//! fact the pipeline persists: registered sources, snapshots, change records,
//! failure state and the delivery log.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Cycle Orchestrator                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  SnapshotRepository                         │
//! └─────────────────────────────────────────────────────────────┘
//!                   │                         │
//!                   ▼                         ▼
//!          ┌─────────────────┐       ┌─────────────────┐
//!          │     SQLite      │       │    In-memory    │
//!          │  Implementation │       │  Implementation │
//!          └─────────────────┘       └─────────────────┘
//! ```
//!
//! A source's state transition after a check is written with a single call
//! ([`SnapshotRepository::commit_success`] or
//! [`SnapshotRepository::commit_failure`]) so it is applied all-or-nothing.
//!
//! # Usage
//!
//! ```rust,ignore
//! use regwatch::storage::repository::{SnapshotRepository, SqliteSnapshotRepository};
//!
//! let repo = SqliteSnapshotRepository::new("data/regwatch.db")?;
//! let current = repo.current_snapshot("fdir-akvakultur")?;
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;

use crate::models::{
    ChangeRecord, DeliveryLogEntry, DeliveryState, FailureState, NewSnapshot, Priority, Snapshot,
    Source, StoreStats,
};

// ============================================================================
// Core Types
// ============================================================================

/// Everything persisted after a successful check of one source
#[derive(Debug, Clone)]
pub struct SourceCommit {
    pub source_id: String,
    pub checked_at: DateTime<Utc>,
    /// New current snapshot; `None` when the content hash is unchanged
    pub snapshot: Option<NewSnapshot>,
    /// Change relative to the previous snapshot
    pub change: Option<ChangeRecord>,
}

impl SourceCommit {
    /// Commit that only refreshes `last_checked`
    pub fn unchanged(source_id: impl Into<String>, checked_at: DateTime<Utc>) -> Self {
        Self {
            source_id: source_id.into(),
            checked_at,
            snapshot: None,
            change: None,
        }
    }
}

/// Identifiers assigned while committing
#[derive(Debug, Clone, Default)]
pub struct CommitResult {
    pub snapshot_id: Option<i64>,
    /// The stored change, with `current_snapshot_id` filled in
    pub change: Option<ChangeRecord>,
}

// ============================================================================
// Repository Trait
// ============================================================================

/// Store for sources, snapshots, change records, failure state and deliveries
pub trait SnapshotRepository: Send + Sync {
    /// Register or update sources from configuration
    ///
    /// Timestamps and the activation flag of known sources are preserved.
    /// Stored sources absent from `sources` are deactivated, never deleted.
    fn sync_sources(&self, sources: &[Source]) -> Result<()>;

    /// All registered sources, ordered by id
    fn list_sources(&self) -> Result<Vec<Source>>;

    /// Get source by id
    fn get_source(&self, id: &str) -> Result<Option<Source>>;

    /// Activate or deactivate a source; returns false if unknown
    fn set_source_active(&self, id: &str, active: bool) -> Result<bool>;

    /// Active sources whose check interval has elapsed at `now`
    fn due_sources(&self, now: DateTime<Utc>) -> Result<Vec<Source>> {
        Ok(self
            .list_sources()?
            .into_iter()
            .filter(|s| s.is_due(now))
            .collect())
    }

    /// Most recent snapshot of a source
    fn current_snapshot(&self, source_id: &str) -> Result<Option<Snapshot>>;

    /// Number of snapshots stored for a source
    fn snapshot_count(&self, source_id: &str) -> Result<u64>;

    /// Apply a successful check atomically and clear the source's failure state
    fn commit_success(&self, commit: SourceCommit) -> Result<CommitResult>;

    /// Persist failure state and `last_checked`; snapshots are untouched
    fn commit_failure(&self, state: &FailureState, checked_at: DateTime<Utc>) -> Result<()>;

    /// Failure state of every currently failing source
    fn load_failure_states(&self) -> Result<Vec<FailureState>>;

    /// Most recent change records, newest first
    fn list_changes(&self, source_id: Option<&str>, limit: usize) -> Result<Vec<ChangeRecord>>;

    /// Append a delivery attempt outcome
    fn log_delivery(&self, entry: &DeliveryLogEntry) -> Result<()>;

    /// Most recent delivery log rows, newest first
    fn delivery_log(&self, limit: usize) -> Result<Vec<DeliveryLogEntry>>;

    /// Aggregate counters
    fn stats(&self, now: DateTime<Utc>) -> Result<StoreStats>;
}

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of SnapshotRepository
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteSnapshotRepository {
    conn: Mutex<Connection>,
}

impl SqliteSnapshotRepository {
    /// Create a new SQLite repository
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite repository initialized");
        Ok(repo)
    }

    /// Create in-memory repository (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection mutex poisoned"))
    }

    /// Create database schema
    fn create_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS sources (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    url TEXT NOT NULL,
                    category TEXT NOT NULL,
                    check_interval_hours INTEGER NOT NULL,
                    priority TEXT NOT NULL,
                    active INTEGER NOT NULL DEFAULT 1,
                    selector TEXT,
                    last_checked TEXT,
                    last_changed TEXT
                );

                CREATE TABLE IF NOT EXISTS snapshots (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    source_id TEXT NOT NULL REFERENCES sources(id),
                    content_hash TEXT NOT NULL,
                    excerpt TEXT NOT NULL,
                    content TEXT,
                    captured_at TEXT NOT NULL,
                    http_status INTEGER NOT NULL,
                    response_time_ms INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_snapshots_source
                    ON snapshots(source_id, id);

                CREATE TABLE IF NOT EXISTS change_records (
                    id TEXT PRIMARY KEY,
                    source_id TEXT NOT NULL REFERENCES sources(id),
                    source_name TEXT NOT NULL,
                    source_url TEXT NOT NULL,
                    category TEXT NOT NULL,
                    previous_snapshot_id INTEGER,
                    current_snapshot_id INTEGER,
                    change_percent REAL NOT NULL,
                    added_lines TEXT NOT NULL,
                    removed_lines TEXT NOT NULL,
                    diff_text TEXT NOT NULL,
                    keywords TEXT NOT NULL,
                    priority TEXT NOT NULL,
                    significant INTEGER NOT NULL,
                    summary_json TEXT NOT NULL,
                    detected_at TEXT NOT NULL,
                    modified_sections TEXT NOT NULL DEFAULT '[]'
                );

                CREATE INDEX IF NOT EXISTS idx_change_records_detected
                    ON change_records(detected_at);

                CREATE TABLE IF NOT EXISTS failure_states (
                    source_id TEXT PRIMARY KEY REFERENCES sources(id),
                    consecutive_failures INTEGER NOT NULL,
                    first_failure_at TEXT NOT NULL,
                    last_failure_at TEXT NOT NULL,
                    last_error TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS delivery_log (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    recipient TEXT NOT NULL,
                    change_id TEXT,
                    channel TEXT NOT NULL,
                    status TEXT NOT NULL,
                    error TEXT,
                    attempted_at TEXT NOT NULL
                );
                "#,
        )
        .context("Failed to create SQLite schema")?;

        Ok(())
    }
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(_) => time_column(row, idx).map(Some),
    }
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

const SOURCE_COLUMNS: &str = "id, name, url, category, check_interval_hours, priority, active, \
     selector, last_checked, last_changed";

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<Source> {
    Ok(Source {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        category: row.get(3)?,
        check_interval_hours: row.get(4)?,
        priority: Priority::parse(&row.get::<_, String>(5)?).unwrap_or_default(),
        active: row.get(6)?,
        selector: row.get(7)?,
        last_checked: optional_time_column(row, 8)?,
        last_changed: optional_time_column(row, 9)?,
    })
}

const SNAPSHOT_COLUMNS: &str =
    "id, source_id, content_hash, excerpt, content, captured_at, http_status, response_time_ms";

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<Snapshot> {
    Ok(Snapshot {
        id: row.get(0)?,
        source_id: row.get(1)?,
        content_hash: row.get(2)?,
        excerpt: row.get(3)?,
        content: row.get(4)?,
        captured_at: time_column(row, 5)?,
        http_status: row.get(6)?,
        response_time_ms: row.get::<_, i64>(7)?.max(0) as u64,
    })
}

const CHANGE_COLUMNS: &str = "id, source_id, source_name, source_url, category, \
     previous_snapshot_id, current_snapshot_id, change_percent, added_lines, removed_lines, \
     diff_text, keywords, priority, significant, summary_json, detected_at, modified_sections";

fn change_from_row(row: &Row<'_>) -> rusqlite::Result<ChangeRecord> {
    Ok(ChangeRecord {
        id: row.get(0)?,
        source_id: row.get(1)?,
        source_name: row.get(2)?,
        source_url: row.get(3)?,
        category: row.get(4)?,
        previous_snapshot_id: row.get(5)?,
        current_snapshot_id: row.get(6)?,
        change_percent: row.get(7)?,
        added_lines: json_column(row, 8)?,
        removed_lines: json_column(row, 9)?,
        diff_text: row.get(10)?,
        keywords: json_column(row, 11)?,
        modified_sections: json_column(row, 16)?,
        priority: Priority::parse(&row.get::<_, String>(12)?).unwrap_or_default(),
        significant: row.get(13)?,
        summary: json_column(row, 14)?,
        detected_at: time_column(row, 15)?,
    })
}

fn failure_from_row(row: &Row<'_>) -> rusqlite::Result<FailureState> {
    Ok(FailureState {
        source_id: row.get(0)?,
        consecutive_failures: row.get(1)?,
        first_failure_at: time_column(row, 2)?,
        last_failure_at: time_column(row, 3)?,
        last_error: row.get(4)?,
    })
}

fn delivery_from_row(row: &Row<'_>) -> rusqlite::Result<DeliveryLogEntry> {
    let status: String = row.get(3)?;
    Ok(DeliveryLogEntry {
        recipient: row.get(0)?,
        change_id: row.get(1)?,
        channel: row.get(2)?,
        status: if status == DeliveryState::Sent.as_str() {
            DeliveryState::Sent
        } else {
            DeliveryState::Failed
        },
        error: row.get(4)?,
        attempted_at: time_column(row, 5)?,
    })
}

impl SnapshotRepository for SqliteSnapshotRepository {
    fn sync_sources(&self, sources: &[Source]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        for source in sources {
            tx.execute(
                r#"
                    INSERT INTO sources (id, name, url, category, check_interval_hours, priority, active, selector)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(id) DO UPDATE SET
                        name = excluded.name,
                        url = excluded.url,
                        category = excluded.category,
                        check_interval_hours = excluded.check_interval_hours,
                        priority = excluded.priority,
                        selector = excluded.selector
                    "#,
                params![
                    source.id,
                    source.name,
                    source.url,
                    source.category,
                    source.check_interval_hours,
                    source.priority.as_str(),
                    source.active,
                    source.selector,
                ],
            )
            .with_context(|| format!("Failed to upsert source {}", source.id))?;
        }

        let configured: HashSet<&str> = sources.iter().map(|s| s.id.as_str()).collect();
        let stored: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM sources WHERE active = 1")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };
        for id in stored.iter().filter(|id| !configured.contains(id.as_str())) {
            tx.execute("UPDATE sources SET active = 0 WHERE id = ?1", params![id])?;
            tracing::info!(source = %id, "Source no longer configured, deactivated");
        }

        tx.commit().context("Failed to commit source sync")?;
        Ok(())
    }

    fn list_sources(&self) -> Result<Vec<Source>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {SOURCE_COLUMNS} FROM sources ORDER BY id"))?;
        let sources = stmt
            .query_map([], source_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list sources")?;
        Ok(sources)
    }

    fn get_source(&self, id: &str) -> Result<Option<Source>> {
        let conn = self.conn()?;
        let source = conn
            .query_row(
                &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = ?1"),
                params![id],
                source_from_row,
            )
            .optional()
            .context("Failed to get source")?;
        Ok(source)
    }

    fn set_source_active(&self, id: &str, active: bool) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE sources SET active = ?2 WHERE id = ?1",
                params![id, active],
            )
            .context("Failed to update source")?;
        Ok(updated > 0)
    }

    fn current_snapshot(&self, source_id: &str) -> Result<Option<Snapshot>> {
        let conn = self.conn()?;
        let snapshot = conn
            .query_row(
                &format!(
                    "SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE source_id = ?1 ORDER BY id DESC LIMIT 1"
                ),
                params![source_id],
                snapshot_from_row,
            )
            .optional()
            .context("Failed to load current snapshot")?;
        Ok(snapshot)
    }

    fn snapshot_count(&self, source_id: &str) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM snapshots WHERE source_id = ?1",
            params![source_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn commit_success(&self, commit: SourceCommit) -> Result<CommitResult> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut result = CommitResult::default();

        let touched = tx.execute(
            "UPDATE sources SET last_checked = ?2 WHERE id = ?1",
            params![commit.source_id, ts(&commit.checked_at)],
        )?;
        if touched == 0 {
            anyhow::bail!("Unknown source: {}", commit.source_id);
        }

        if let Some(snapshot) = &commit.snapshot {
            tx.execute(
                "UPDATE snapshots SET content = NULL WHERE source_id = ?1 AND content IS NOT NULL",
                params![snapshot.source_id],
            )?;
            tx.execute(
                r#"
                    INSERT INTO snapshots (source_id, content_hash, excerpt, content, captured_at, http_status, response_time_ms)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                params![
                    snapshot.source_id,
                    snapshot.content_hash,
                    snapshot.excerpt,
                    snapshot.content,
                    ts(&snapshot.captured_at),
                    snapshot.http_status,
                    snapshot.response_time_ms as i64,
                ],
            )
            .context("Failed to insert snapshot")?;
            result.snapshot_id = Some(tx.last_insert_rowid());
        }

        if let Some(mut change) = commit.change {
            change.current_snapshot_id = result.snapshot_id.or(change.current_snapshot_id);
            tx.execute(
                &format!(
                    "INSERT INTO change_records ({CHANGE_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
                ),
                params![
                    change.id,
                    change.source_id,
                    change.source_name,
                    change.source_url,
                    change.category,
                    change.previous_snapshot_id,
                    change.current_snapshot_id,
                    change.change_percent,
                    serde_json::to_string(&change.added_lines)?,
                    serde_json::to_string(&change.removed_lines)?,
                    change.diff_text,
                    serde_json::to_string(&change.keywords)?,
                    change.priority.as_str(),
                    change.significant,
                    serde_json::to_string(&change.summary)?,
                    ts(&change.detected_at),
                    serde_json::to_string(&change.modified_sections)?,
                ],
            )
            .context("Failed to insert change record")?;
            tx.execute(
                "UPDATE sources SET last_changed = ?2 WHERE id = ?1",
                params![change.source_id, ts(&change.detected_at)],
            )?;
            result.change = Some(change);
        }

        tx.execute(
            "DELETE FROM failure_states WHERE source_id = ?1",
            params![commit.source_id],
        )?;

        tx.commit().context("Failed to commit source state")?;
        Ok(result)
    }

    fn commit_failure(&self, state: &FailureState, checked_at: DateTime<Utc>) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
                INSERT INTO failure_states (source_id, consecutive_failures, first_failure_at, last_failure_at, last_error)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(source_id) DO UPDATE SET
                    consecutive_failures = excluded.consecutive_failures,
                    first_failure_at = excluded.first_failure_at,
                    last_failure_at = excluded.last_failure_at,
                    last_error = excluded.last_error
                "#,
            params![
                state.source_id,
                state.consecutive_failures,
                ts(&state.first_failure_at),
                ts(&state.last_failure_at),
                state.last_error,
            ],
        )
        .context("Failed to save failure state")?;
        tx.execute(
            "UPDATE sources SET last_checked = ?2 WHERE id = ?1",
            params![state.source_id, ts(&checked_at)],
        )?;

        tx.commit().context("Failed to commit failure state")?;
        Ok(())
    }

    fn load_failure_states(&self) -> Result<Vec<FailureState>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT source_id, consecutive_failures, first_failure_at, last_failure_at, last_error \
             FROM failure_states ORDER BY source_id",
        )?;
        let states = stmt
            .query_map([], failure_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load failure states")?;
        Ok(states)
    }

    fn list_changes(&self, source_id: Option<&str>, limit: usize) -> Result<Vec<ChangeRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHANGE_COLUMNS} FROM change_records \
             WHERE (?1 IS NULL OR source_id = ?1) \
             ORDER BY detected_at DESC, rowid DESC LIMIT ?2"
        ))?;
        let changes = stmt
            .query_map(params![source_id, limit as i64], change_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list change records")?;
        Ok(changes)
    }

    fn log_delivery(&self, entry: &DeliveryLogEntry) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
                INSERT INTO delivery_log (recipient, change_id, channel, status, error, attempted_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            params![
                entry.recipient,
                entry.change_id,
                entry.channel,
                entry.status.as_str(),
                entry.error,
                ts(&entry.attempted_at),
            ],
        )
        .context("Failed to log delivery")?;
        Ok(())
    }

    fn delivery_log(&self, limit: usize) -> Result<Vec<DeliveryLogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT recipient, change_id, channel, status, error, attempted_at \
             FROM delivery_log ORDER BY id DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit as i64], delivery_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read delivery log")?;
        Ok(entries)
    }

    fn stats(&self, now: DateTime<Utc>) -> Result<StoreStats> {
        let conn = self.conn()?;
        let day_ago = ts(&(now - Duration::hours(24)));
        let week_ago = ts(&(now - Duration::days(7)));

        let count = |sql: &str, args: &[&dyn rusqlite::ToSql]| -> Result<u64> {
            let n: i64 = conn.query_row(sql, args, |row| row.get(0))?;
            Ok(n as u64)
        };

        Ok(StoreStats {
            sources_total: count("SELECT COUNT(*) FROM sources", &[])?,
            sources_active: count("SELECT COUNT(*) FROM sources WHERE active = 1", &[])?,
            snapshots_total: count("SELECT COUNT(*) FROM snapshots", &[])?,
            snapshots_last_24h: count(
                "SELECT COUNT(*) FROM snapshots WHERE captured_at >= ?1",
                &[&day_ago],
            )?,
            changes_total: count("SELECT COUNT(*) FROM change_records", &[])?,
            changes_significant: count(
                "SELECT COUNT(*) FROM change_records WHERE significant = 1",
                &[],
            )?,
            changes_last_24h: count(
                "SELECT COUNT(*) FROM change_records WHERE detected_at >= ?1",
                &[&day_ago],
            )?,
            changes_last_7d: count(
                "SELECT COUNT(*) FROM change_records WHERE detected_at >= ?1",
                &[&week_ago],
            )?,
            deliveries_total: count("SELECT COUNT(*) FROM delivery_log", &[])?,
            deliveries_sent: count(
                "SELECT COUNT(*) FROM delivery_log WHERE status = 'sent'",
                &[],
            )?,
            deliveries_failed: count(
                "SELECT COUNT(*) FROM delivery_log WHERE status = 'failed'",
                &[],
            )?,
            failing_sources: count("SELECT COUNT(*) FROM failure_states", &[])?,
        })
    }
}

// ============================================================================
// In-memory Implementation
// ============================================================================

#[derive(Default)]
struct MemoryState {
    sources: BTreeMap<String, Source>,
    snapshots: Vec<Snapshot>,
    changes: Vec<ChangeRecord>,
    failures: HashMap<String, FailureState>,
    deliveries: Vec<DeliveryLogEntry>,
    next_snapshot_id: i64,
}

/// In-memory implementation of SnapshotRepository
///
/// Useful for tests and dry runs. A single lock guards all state so each
/// commit is atomic.
#[derive(Default)]
pub struct MemorySnapshotRepository {
    state: RwLock<MemoryState>,
}

impl MemorySnapshotRepository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| anyhow!("Repository lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| anyhow!("Repository lock poisoned"))
    }
}

impl SnapshotRepository for MemorySnapshotRepository {
    fn sync_sources(&self, sources: &[Source]) -> Result<()> {
        let mut state = self.write()?;
        let configured: HashSet<&str> = sources.iter().map(|s| s.id.as_str()).collect();

        for stored in state.sources.values_mut() {
            if stored.active && !configured.contains(stored.id.as_str()) {
                stored.active = false;
                tracing::info!(source = %stored.id, "Source no longer configured, deactivated");
            }
        }

        for source in sources {
            match state.sources.get_mut(&source.id) {
                Some(stored) => {
                    stored.name = source.name.clone();
                    stored.url = source.url.clone();
                    stored.category = source.category.clone();
                    stored.check_interval_hours = source.check_interval_hours;
                    stored.priority = source.priority;
                    stored.selector = source.selector.clone();
                }
                None => {
                    state.sources.insert(source.id.clone(), source.clone());
                }
            }
        }
        Ok(())
    }

    fn list_sources(&self) -> Result<Vec<Source>> {
        Ok(self.read()?.sources.values().cloned().collect())
    }

    fn get_source(&self, id: &str) -> Result<Option<Source>> {
        Ok(self.read()?.sources.get(id).cloned())
    }

    fn set_source_active(&self, id: &str, active: bool) -> Result<bool> {
        let mut state = self.write()?;
        Ok(match state.sources.get_mut(id) {
            Some(source) => {
                source.active = active;
                true
            }
            None => false,
        })
    }

    fn current_snapshot(&self, source_id: &str) -> Result<Option<Snapshot>> {
        Ok(self
            .read()?
            .snapshots
            .iter()
            .rev()
            .find(|s| s.source_id == source_id)
            .cloned())
    }

    fn snapshot_count(&self, source_id: &str) -> Result<u64> {
        Ok(self
            .read()?
            .snapshots
            .iter()
            .filter(|s| s.source_id == source_id)
            .count() as u64)
    }

    fn commit_success(&self, commit: SourceCommit) -> Result<CommitResult> {
        let mut state = self.write()?;
        let state = &mut *state;
        let mut result = CommitResult::default();

        let Some(source) = state.sources.get_mut(&commit.source_id) else {
            anyhow::bail!("Unknown source: {}", commit.source_id);
        };
        source.last_checked = Some(commit.checked_at);

        if let Some(snapshot) = commit.snapshot {
            for old in state
                .snapshots
                .iter_mut()
                .filter(|s| s.source_id == snapshot.source_id)
            {
                old.content = None;
            }
            state.next_snapshot_id += 1;
            let id = state.next_snapshot_id;
            state.snapshots.push(Snapshot {
                id,
                source_id: snapshot.source_id,
                content_hash: snapshot.content_hash,
                excerpt: snapshot.excerpt,
                content: Some(snapshot.content),
                captured_at: snapshot.captured_at,
                http_status: snapshot.http_status,
                response_time_ms: snapshot.response_time_ms,
            });
            result.snapshot_id = Some(id);
        }

        if let Some(mut change) = commit.change {
            change.current_snapshot_id = result.snapshot_id.or(change.current_snapshot_id);
            source.last_changed = Some(change.detected_at);
            state.changes.push(change.clone());
            result.change = Some(change);
        }

        state.failures.remove(&commit.source_id);
        Ok(result)
    }

    fn commit_failure(&self, failure: &FailureState, checked_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.write()?;
        if let Some(source) = state.sources.get_mut(&failure.source_id) {
            source.last_checked = Some(checked_at);
        }
        state
            .failures
            .insert(failure.source_id.clone(), failure.clone());
        Ok(())
    }

    fn load_failure_states(&self) -> Result<Vec<FailureState>> {
        let mut states: Vec<FailureState> = self.read()?.failures.values().cloned().collect();
        states.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        Ok(states)
    }

    fn list_changes(&self, source_id: Option<&str>, limit: usize) -> Result<Vec<ChangeRecord>> {
        let state = self.read()?;
        let mut changes: Vec<ChangeRecord> = state
            .changes
            .iter()
            .rev()
            .filter(|c| source_id.map_or(true, |id| c.source_id == id))
            .cloned()
            .collect();
        changes.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        changes.truncate(limit);
        Ok(changes)
    }

    fn log_delivery(&self, entry: &DeliveryLogEntry) -> Result<()> {
        self.write()?.deliveries.push(entry.clone());
        Ok(())
    }

    fn delivery_log(&self, limit: usize) -> Result<Vec<DeliveryLogEntry>> {
        Ok(self
            .read()?
            .deliveries
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    fn stats(&self, now: DateTime<Utc>) -> Result<StoreStats> {
        let state = self.read()?;
        let day_ago = now - Duration::hours(24);
        let week_ago = now - Duration::days(7);
        let count = |n: usize| n as u64;

        Ok(StoreStats {
            sources_total: count(state.sources.len()),
            sources_active: count(state.sources.values().filter(|s| s.active).count()),
            snapshots_total: count(state.snapshots.len()),
            snapshots_last_24h: count(
                state
                    .snapshots
                    .iter()
                    .filter(|s| s.captured_at >= day_ago)
                    .count(),
            ),
            changes_total: count(state.changes.len()),
            changes_significant: count(state.changes.iter().filter(|c| c.significant).count()),
            changes_last_24h: count(
                state
                    .changes
                    .iter()
                    .filter(|c| c.detected_at >= day_ago)
                    .count(),
            ),
            changes_last_7d: count(
                state
                    .changes
                    .iter()
                    .filter(|c| c.detected_at >= week_ago)
                    .count(),
            ),
            deliveries_total: count(state.deliveries.len()),
            deliveries_sent: count(
                state
                    .deliveries
                    .iter()
                    .filter(|d| d.status == DeliveryState::Sent)
                    .count(),
            ),
            deliveries_failed: count(
                state
                    .deliveries
                    .iter()
                    .filter(|d| d.status == DeliveryState::Failed)
                    .count(),
            ),
            failing_sources: count(state.failures.len()),
        })
    }
}

// ============================================================================
// Shared Repository Types
// ============================================================================

/// Thread-safe shared repository wrapper
pub type SharedSnapshotRepository = Arc<dyn SnapshotRepository>;

/// Create a shared SQLite repository
pub fn create_sqlite_repository(path: impl AsRef<Path>) -> Result<SharedSnapshotRepository> {
    let repo = SqliteSnapshotRepository::new(path)?;
    Ok(Arc::new(repo))
}

/// Create a shared in-memory repository
pub fn create_memory_repository() -> SharedSnapshotRepository {
    Arc::new(MemorySnapshotRepository::new())
}

// ============================================================================
// Tests
// ============================================================================
