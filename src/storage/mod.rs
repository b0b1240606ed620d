//! Persistent state for sources, snapshots and change records
//!
//! SQLite is the production store; an in-memory store with identical
//! semantics backs tests and dry runs.

pub mod repository;

pub use repository::{
    create_memory_repository, create_sqlite_repository, CommitResult, MemorySnapshotRepository,
    SharedSnapshotRepository, SnapshotRepository, SourceCommit, SqliteSnapshotRepository,
};

use std::path::Path;

use anyhow::Result;

/// Open the configured store, falling back to memory when no path is set
pub fn open_repository(path: Option<&Path>) -> Result<SharedSnapshotRepository> {
    match path {
        Some(path) => create_sqlite_repository(path),
        None => {
            tracing::warn!("No SQLite path configured, state will not survive restarts");
            Ok(create_memory_repository())
        }
    }
}
