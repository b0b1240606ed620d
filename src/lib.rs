//! regwatch - Regulatory web-page change detection
//!
//! Watches a fixed set of public pages for substantive content changes,
//! decides which changes matter and routes notifications to subscribers.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Rate-limited fetching, the monitoring cycle and health checks
//! - [`parser`] - Text extraction and normalization of volatile content
//! - [`analytics`] - Diffing, significance scoring and priority
//! - [`models`] - Core data structures and types
//! - [`storage`] - Snapshot store (SQLite, in-memory)
//! - [`scheduler`] - Failure tracking, shutdown and the daemon loop
//! - [`notifications`] - Routing and delivery channels
//! - [`llm`] - Optional change summarization service
//! - [`metrics`] - Prometheus metrics
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use regwatch::config::Config;
//! use regwatch::crawler::{CycleOptions, CycleOrchestrator};
//! use regwatch::scheduler::ShutdownSignal;
//! use regwatch::storage::open_repository;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file(std::path::Path::new("config.toml"))?;
//!     let repository = open_repository(config.storage.sqlite_path.as_deref())?;
//!     repository.sync_sources(&config.source_list())?;
//!
//!     let orchestrator = CycleOrchestrator::from_config(&config, repository)?;
//!     let report = orchestrator
//!         .run_cycle(&CycleOptions::default(), &ShutdownSignal::never())
//!         .await?;
//!     println!("{} changes", report.changes_recorded);
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod config;
pub mod crawler;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod parser;
pub mod scheduler;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::analytics::{ChangeAnalysis, ChangeAnalyzer};
    pub use crate::config::Config;
    pub use crate::crawler::{CycleOptions, CycleOrchestrator, CycleReport, PageFetcher};
    pub use crate::error::{Error, ErrorCategory, Result, WatchErrorTrait};
    pub use crate::models::{ChangeRecord, Priority, Source, Subscriber};
    pub use crate::storage::{SharedSnapshotRepository, SnapshotRepository};
}

// Direct re-exports for convenience
pub use models::{ChangeRecord, Priority, Source, Subscriber};
