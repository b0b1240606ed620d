//! Fetching monitored pages and running monitoring cycles
//!
//! - [`fetcher`] - Rate-limited HTTP fetching with retries and text extraction
//! - [`pipeline`] - Per-source checks and the cycle orchestrator
//! - [`health`] - On-demand reachability check with operator alerting

pub mod fetcher;
pub mod health;
pub mod pipeline;

pub use fetcher::{FetchedPage, FetcherConfig, PageFetcher, DEFAULT_USER_AGENT};
pub use health::{HealthChecker, HealthReport, HealthStatus, SourceHealth, StoreHealth};
pub use pipeline::{
    CycleOptions, CycleOrchestrator, CycleReport, SourceCheck, SourceChecker, SourceOutcome,
};
