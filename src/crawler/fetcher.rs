//! HTTP fetcher with rate limiting and bounded retries
//!
//! This module provides the page fetcher used for every monitored source:
//! - Token-bucket rate limiting with governor, shared across all sources
//! - Bounded retries with linear or exponential backoff
//! - Charset decoding from the `Content-Type` header
//! - Text extraction and hashing of the normalized text

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};

use crate::parser::{ContentExtractor, HtmlTextExtractor, Normalizer, PlainTextExtractor};
use crate::utils::decode_body;
use crate::utils::error::FetchError;
use crate::utils::retry::{with_retry_if, RetryConfig};

/// Default User-Agent sent with every request
pub const DEFAULT_USER_AGENT: &str = "AquaRegWatch/1.0 (+regulatory change monitoring)";

const ACCEPT_LANGUAGE_VALUE: &str = "no,nb,nn,en;q=0.5";

/// Settings for [`PageFetcher`]
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Minimum interval between requests in milliseconds, 0 disables limiting
    pub min_interval_ms: u64,

    /// Requests allowed back-to-back before the interval applies
    pub burst: u32,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// User-Agent header value
    pub user_agent: String,

    pub retry: RetryConfig,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 2000,
            burst: 1,
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

/// Successful fetch of one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    /// Extracted plain text, one block per line
    pub text: String,
    /// SHA-256 hex of the normalized text
    pub content_hash: String,
    pub response_time_ms: u64,
    /// Attempts used, including the successful one
    pub attempts: u32,
    pub fetched_at: DateTime<Utc>,
}

struct RawResponse {
    status: u16,
    content_type: Option<String>,
    body: String,
    elapsed_ms: u64,
}

/// Page fetcher shared by all sources of a cycle
pub struct PageFetcher {
    /// HTTP client with configured timeout and default headers
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,

    retry: RetryConfig,

    timeout: Duration,

    extractor: Arc<dyn ContentExtractor>,

    normalizer: Normalizer,
}

impl PageFetcher {
    /// Create a fetcher with the HTML extractor and built-in normalization
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        Self::with_components(config, Arc::new(HtmlTextExtractor::new()), Normalizer::new())
    }

    /// Create a fetcher with a custom extractor and normalizer
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_components(
        config: &FetcherConfig,
        extractor: Arc<dyn ContentExtractor>,
        normalizer: Normalizer,
    ) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(Self::default_headers())
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            rate_limiter: Self::build_limiter(config.min_interval_ms, config.burst),
            retry: config.retry.clone(),
            timeout,
            extractor,
            normalizer,
        })
    }

    fn build_limiter(
        min_interval_ms: u64,
        burst: u32,
    ) -> Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>> {
        let quota = Quota::with_period(Duration::from_millis(min_interval_ms))?;
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        Some(RateLimiter::direct(quota.allow_burst(burst)))
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,text/plain;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));
        headers
    }

    /// Normalizer used for content hashes
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Fetch a page, extract its text and hash the normalized text
    ///
    /// Transient failures (timeouts, connection errors, 408, 429, 5xx) are
    /// retried up to the configured attempt budget; any other status fails
    /// after a single attempt.
    ///
    /// # Errors
    ///
    /// - `FetchError::InvalidUrl` if `url` does not parse
    /// - `FetchError::Status` for a permanent status such as 404
    /// - `FetchError::RetriesExhausted` once every attempt failed transiently
    /// - `FetchError::Parse` if no text could be extracted
    pub async fn fetch(&self, url: &str, selector: Option<&str>) -> Result<FetchedPage, FetchError> {
        url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

        let attempts = AtomicU32::new(0);
        let raw = with_retry_if(
            &self.retry,
            |attempt| {
                attempts.store(attempt, Ordering::Relaxed);
                self.fetch_once(url, attempt)
            },
            FetchError::is_retryable,
        )
        .await;
        let attempts = attempts.load(Ordering::Relaxed);

        let raw = match raw {
            Ok(raw) => raw,
            Err(e) if e.is_retryable() => {
                return Err(FetchError::RetriesExhausted {
                    attempts,
                    last: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let is_plain = raw
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("text/plain"));
        let text = if is_plain {
            PlainTextExtractor.extract(&raw.body, selector)?
        } else {
            self.extractor.extract(&raw.body, selector)?
        };

        let content_hash = self.normalizer.content_hash(&text);

        tracing::debug!(
            url = %url,
            status = raw.status,
            attempts = attempts,
            response_time_ms = raw.elapsed_ms,
            "Page fetched"
        );

        Ok(FetchedPage {
            url: url.to_string(),
            status: raw.status,
            text,
            content_hash,
            response_time_ms: raw.elapsed_ms,
            attempts,
            fetched_at: Utc::now(),
        })
    }

    async fn fetch_once(&self, url: &str, attempt: u32) -> Result<RawResponse, FetchError> {
        // Wait for rate limiter
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        tracing::trace!(url = %url, attempt = attempt, "Sending request");
        let started = Instant::now();

        let response = self.client.get(url).send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;

        Ok(RawResponse {
            status: status.as_u16(),
            body: decode_body(&bytes, content_type.as_deref()),
            content_type,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn classify(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout.as_millis() as u64)
        } else {
            FetchError::Http(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_creation() {
        let fetcher = PageFetcher::new(&FetcherConfig::default());
        assert!(fetcher.is_ok());
    }

    #[test]
    fn test_zero_interval_disables_limiter() {
        assert!(PageFetcher::build_limiter(0, 1).is_none());
        assert!(PageFetcher::build_limiter(500, 0).is_some());
    }

    #[test]
    fn test_limiter_burst() {
        let limiter = PageFetcher::build_limiter(60_000, 2).unwrap();
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[test]
    fn test_default_headers() {
        let headers = PageFetcher::default_headers();
        assert_eq!(
            headers.get(ACCEPT_LANGUAGE).unwrap().to_str().unwrap(),
            "no,nb,nn,en;q=0.5"
        );
        assert!(headers.contains_key(ACCEPT));
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let fetcher = PageFetcher::new(&FetcherConfig::default()).unwrap();
        let err = fetcher.fetch("not a url", None).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
        assert!(!err.is_retryable());
    }
}
