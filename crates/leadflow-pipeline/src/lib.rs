//! Leadflow Pipeline Library
//!
//! Ordered execution of the lead-generation pipeline over CSV artifacts.
//!
//! # Overview
//!
//! - **Artifacts**: CSV tables with read-back verified, backup-guarded
//!   saves ([`cache::ContentCache`])
//! - **Stages**: external commands or the built-in ingestion stage
//!   behind the [`stage::Stage`] trait
//! - **Orchestration**: sequential runs with per-stage metrics, failure
//!   policy, and a JSONL run history
//!   ([`orchestrator::PipelineOrchestrator`])
//! - **Configuration**: defaults, JSON file, then environment overrides
//!   ([`config::PipelineConfig`])

pub mod artifact;
pub mod cache;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod stage;

// Re-export commonly used types
pub use error::{PipelineError, Result};
