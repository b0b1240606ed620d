//! Scheduling of monitoring cycles
//!
//! # Modules
//!
//! - [`daemon`] - Periodic cycle loop with graceful shutdown
//! - [`health`] - Consecutive-failure tracking and alert thresholds
//! - [`shutdown`] - Cooperative cancellation signal
//!
//! # Quick Start
//!
//! ```ignore
//! use regwatch::scheduler::{run_daemon, shutdown_channel, wait_for_termination, DaemonConfig};
//! use std::time::Duration;
//!
//! let (handle, signal) = shutdown_channel();
//! tokio::spawn(async move {
//!     wait_for_termination().await;
//!     handle.shutdown();
//! });
//!
//! let config = DaemonConfig::new(Duration::from_secs(3600));
//! run_daemon(&orchestrator, &config, signal).await?;
//! ```

pub mod daemon;
pub mod health;
pub mod shutdown;

pub use daemon::{run_daemon, DaemonConfig, DaemonSummary};
pub use health::{FailureAlert, FailureTracker, DEFAULT_FAILURE_THRESHOLD};
pub use shutdown::{shutdown_channel, wait_for_termination, ShutdownHandle, ShutdownSignal};
