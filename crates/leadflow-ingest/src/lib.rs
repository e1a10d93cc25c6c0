//! Leadflow Ingest Library
//!
//! Rate-limited, retrying acquisition of YouTube comment data.
//!
//! # Overview
//!
//! - **Client**: paginated YouTube Data API v3 access behind the
//!   [`youtube::CommentApi`] trait
//! - **Rate Limiting**: a single [`rate_limit::RateLimiter`] spaces all
//!   outbound requests
//! - **Retry**: [`retry::RetryExecutor`] classifies failures and backs
//!   off exponentially, with jitter on quota errors
//! - **Fetching**: [`fetcher::ConcurrentFetcher`] runs work units over
//!   bounded worker pools with per-unit timeouts and failure isolation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use leadflow_ingest::fetcher::{ConcurrentFetcher, FetcherConfig};
//! use leadflow_ingest::rate_limit::RateLimiter;
//! use leadflow_ingest::retry::{RetryExecutor, RetryPolicy};
//! use leadflow_ingest::youtube::YouTubeClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let api = Arc::new(YouTubeClient::from_env()?);
//!     let retry = Arc::new(RetryExecutor::new(
//!         Arc::new(RateLimiter::new(Duration::from_millis(100))),
//!         RetryPolicy::default(),
//!     ));
//!     let fetcher = ConcurrentFetcher::new(api, retry, FetcherConfig::default())?;
//!     let units = fetcher.expand_playlists(&["PLxyz".to_string()]).await?;
//!     let outcome = fetcher.fetch_all(units).await;
//!     println!("{} records", outcome.records.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod fetcher;
pub mod rate_limit;
pub mod retry;
pub mod youtube;

// Re-export commonly used types
pub use error::{IngestError, Result};
pub use fetcher::{ConcurrentFetcher, FetchOutcome, FetcherConfig};
pub use rate_limit::RateLimiter;
pub use retry::{RetryExecutor, RetryPolicy};
