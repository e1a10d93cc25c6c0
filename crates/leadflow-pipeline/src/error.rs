//! Pipeline error types

use leadflow_ingest::IngestError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The artifact read back from disk does not match what was written.
    /// The previous version survives at `<path>.backup`.
    #[error(
        "Integrity check failed for {path}: wrote {expected} rows but re-read {actual}. \
         The previous version is preserved at {path}.backup"
    )]
    Integrity {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("Stage '{stage}' failed: {message}")]
    StageFailure { stage: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl PipelineError {
    pub fn stage_failure(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StageFailure {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn integrity(path: &std::path::Path, expected: usize, actual: usize) -> Self {
        Self::Integrity {
            path: path.display().to_string(),
            expected,
            actual,
        }
    }
}
