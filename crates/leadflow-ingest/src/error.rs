//! Error types for ingestion
//!
//! Failures are classified by how the retry layer should treat them:
//! quota errors back off with jitter, transient errors back off plainly,
//! non-retryable errors propagate immediately.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Error type for API ingestion
#[derive(Error, Debug)]
pub enum IngestError {
    /// Provider signalled quota exhaustion (HTTP 403/429-class).
    #[error("API quota exceeded: {0}. The provider rate limit was hit; the call will be retried after a cooldown.")]
    QuotaExceeded(String),

    /// Transient failure (timeouts, connection resets, 5xx responses).
    #[error("Transient network failure: {0}")]
    TransientNetwork(String),

    /// Request is malformed or unauthorized; retrying cannot help.
    #[error("Non-retryable request error: {0}. Check the request parameters and the YOUTUBE_API_KEY environment variable.")]
    NonRetryable(String),

    /// All retry attempts were spent.
    #[error("Retries exhausted after {attempts} attempt(s): {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<IngestError>,
    },

    /// A work unit exceeded its per-unit timeout.
    #[error("Work unit timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Invalid fetcher or client configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IngestError {
    /// Whether the retry layer may attempt this call again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IngestError::QuotaExceeded(_) | IngestError::TransientNetwork(_)
        )
    }

    /// Whether the retry backoff should carry cooldown jitter.
    pub fn is_quota(&self) -> bool {
        matches!(self, IngestError::QuotaExceeded(_))
    }

    /// Classify a non-success HTTP response.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = format!("HTTP {}: {}", status, truncate(body, 200));
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            IngestError::QuotaExceeded(detail)
        } else if status.is_server_error() {
            IngestError::TransientNetwork(detail)
        } else {
            IngestError::NonRetryable(detail)
        }
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() || e.is_decode() {
            IngestError::NonRetryable(e.to_string())
        } else {
            // Timeouts, connect failures, and dropped bodies are worth a retry
            IngestError::TransientNetwork(e.to_string())
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
