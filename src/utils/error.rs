//! Error types for fetching and extraction
//!
//! This module defines the errors produced while retrieving a monitored page
//! and turning its body into plain text.

use thiserror::Error;

/// Errors that can occur during HTTP fetching operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error (connection refused, reset, DNS, ...)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timeout
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Retryable status code (408, 429 and 5xx)
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Non-retryable status code, not-found being the usual case
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Extracted text could not be produced from the body
    #[error("Extraction failed: {0}")]
    Parse(#[from] ParseError),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// All attempts failed with a transient error
    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl FetchError {
    /// Whether another attempt within the same fetch may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_builder() && !e.is_redirect(),
            Self::Timeout(_) | Self::ServerError(_) => true,
            Self::Status(_)
            | Self::Decode(_)
            | Self::Parse(_)
            | Self::InvalidUrl(_)
            | Self::RetriesExhausted { .. } => false,
        }
    }

    /// Whether the source should be expected to succeed on a later cycle
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Timeout(_) | Self::ServerError(_) | Self::RetriesExhausted { .. }
        )
    }

    /// HTTP status associated with the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ServerError(code) | Self::Status(code) => Some(*code),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Classify a non-success status code
    pub fn from_status(code: u16) -> Self {
        if code == 408 || code == 429 || (500..600).contains(&code) {
            Self::ServerError(code)
        } else {
            Self::Status(code)
        }
    }
}

/// Errors that can occur while extracting text from a fetched body
#[derive(Error, Debug)]
pub enum ParseError {
    /// Configured selector is not valid CSS
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// No text could be located in the document
    #[error("Content not found in document")]
    ContentNotFound,
}
