//! Leadflow Common Library
//!
//! Shared types and utilities for the Leadflow workspace.
//!
//! # Overview
//!
//! This crate provides the pieces used across all Leadflow members:
//!
//! - **Types**: work units, fetched records, stage/run status
//! - **Fingerprints**: file staleness detection for the artifact cache
//! - **Logging**: tracing subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use leadflow_common::fingerprint::file_fingerprint;
//!
//! let fp = file_fingerprint("data/comments_data.csv".as_ref())?;
//! println!("fingerprint: {}", fp);
//! # Ok::<(), std::io::Error>(())
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod fingerprint;
pub mod logging;
pub mod types;

pub use types::{FetchRecord, RunMetrics, RunStatus, StageStatus, WorkUnit};
