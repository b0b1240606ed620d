//! Unified error handling for the regwatch crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`WatchErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use regwatch::error::{Error, ErrorCategory, WatchErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     match err.category() {
//!         ErrorCategory::FetchTransient => tracing::warn!("will retry next cycle: {err}"),
//!         _ => tracing::error!("{err}"),
//!     }
//! }
//! ```

use serde::Serialize;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::llm::SummarizeError;
pub use crate::notifications::channels::ChannelError;
pub use crate::utils::error::{FetchError, ParseError};

/// Common trait for all regwatch error types
pub trait WatchErrorTrait: std::error::Error {
    /// Check if this error is recoverable (the operation may succeed later)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Timeout, connection failure or 5xx; retried within the fetch
    FetchTransient,
    /// Not-found and other client errors; never retried
    FetchPermanent,
    /// Extraction failure, treated as permanent for the cycle
    ParseFailure,
    /// Summarizer missing or failing; the fallback summary is used
    SummarizationUnavailable,
    /// Delivery to one subscriber failed
    DeliveryFailure,
    /// Storage and I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchTransient => "fetch_transient",
            Self::FetchPermanent => "fetch_permanent",
            Self::ParseFailure => "parse_failure",
            Self::SummarizationUnavailable => "summarization_unavailable",
            Self::DeliveryFailure => "delivery_failure",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the regwatch crate
#[derive(Error, Debug)]
pub enum Error {
    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Summarizer errors
    #[error("Summarizer error: {0}")]
    Summarize(#[from] SummarizeError),

    /// Delivery channel errors
    #[error("Delivery error: {0}")]
    Channel(#[from] ChannelError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl WatchErrorTrait for FetchError {
    fn is_recoverable(&self) -> bool {
        FetchError::is_recoverable(self)
    }

    fn category(&self) -> ErrorCategory {
        match self {
            FetchError::Parse(_) | FetchError::Decode(_) => ErrorCategory::ParseFailure,
            e if e.is_recoverable() => ErrorCategory::FetchTransient,
            _ => ErrorCategory::FetchPermanent,
        }
    }
}

impl WatchErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Summarize(_) => true,
            Self::Channel(e) => e.is_recoverable(),
            // Busy and locked are transient
            Self::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            Self::Database(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) => WatchErrorTrait::category(e),
            Self::Summarize(_) => ErrorCategory::SummarizationUnavailable,
            Self::Channel(_) => ErrorCategory::DeliveryFailure,
            Self::Database(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Classify a store failure, keeping the SQLite error when there is one
    pub fn from_storage(err: anyhow::Error) -> Self {
        match err.downcast::<rusqlite::Error>() {
            Ok(db) => Self::Database(db),
            Err(err) => Self::Other {
                context: format!("Storage error: {err:#}"),
                source: None,
            },
        }
    }
}

// Conversion from rusqlite::Error
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err)
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: format!("{err:#}"),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
