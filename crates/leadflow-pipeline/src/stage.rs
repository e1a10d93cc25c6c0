//! Pipeline stages
//!
//! A stage is one ordered step of a run. Most stages shell out to an
//! external transform command; ingestion runs in-process because it owns
//! the rate limiter and worker pools.

use crate::artifact::TableArtifact;
use crate::cache::ContentCache;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use leadflow_ingest::youtube::CommentApi;
use leadflow_ingest::{ConcurrentFetcher, RateLimiter, RetryExecutor};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Static description of a stage: identity, data dependencies, criticality.
#[derive(Debug, Clone)]
pub struct StageDescriptor {
    pub name: String,
    /// Artifacts the stage reads. Informational; commands open the files
    /// themselves.
    pub inputs: Vec<PathBuf>,
    /// Artifact the stage produces, if any. Drives the per-stage metrics.
    pub output: Option<PathBuf>,
    /// A failed critical stage aborts the run; a failed non-critical
    /// stage is recorded and skipped over.
    pub critical: bool,
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn descriptor(&self) -> &StageDescriptor;

    async fn run(&self, cache: &ContentCache) -> Result<()>;
}

// ============================================================================
// Command Stage
// ============================================================================

/// A stage that runs an external command and judges it by exit status.
pub struct CommandStage {
    descriptor: StageDescriptor,
    program: String,
    args: Vec<String>,
}

impl CommandStage {
    pub fn new(descriptor: StageDescriptor, program: String, args: Vec<String>) -> Self {
        Self {
            descriptor,
            program,
            args,
        }
    }
}

#[async_trait]
impl Stage for CommandStage {
    fn descriptor(&self) -> &StageDescriptor {
        &self.descriptor
    }

    async fn run(&self, _cache: &ContentCache) -> Result<()> {
        info!(
            stage = %self.descriptor.name,
            program = %self.program,
            "Running stage command"
        );

        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| {
                PipelineError::stage_failure(
                    &self.descriptor.name,
                    format!("failed to spawn '{}': {}", self.program, e),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .chars()
                .rev()
                .take(400)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            return Err(PipelineError::stage_failure(
                &self.descriptor.name,
                format!("exit status {}: {}", output.status, tail.trim()),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Ingest Stage
// ============================================================================

/// The in-process ingestion stage: expand playlists into work units,
/// fetch them concurrently, and persist the deduplicated records.
pub struct IngestStage {
    descriptor: StageDescriptor,
    fetcher: ConcurrentFetcher,
    playlists: Vec<String>,
    output: PathBuf,
}

impl IngestStage {
    pub fn new(
        descriptor: StageDescriptor,
        fetcher: ConcurrentFetcher,
        playlists: Vec<String>,
        output: PathBuf,
    ) -> Self {
        Self {
            descriptor,
            fetcher,
            playlists,
            output,
        }
    }
}

#[async_trait]
impl Stage for IngestStage {
    fn descriptor(&self) -> &StageDescriptor {
        &self.descriptor
    }

    async fn run(&self, cache: &ContentCache) -> Result<()> {
        if self.playlists.is_empty() {
            return Err(PipelineError::stage_failure(
                &self.descriptor.name,
                "no playlists configured",
            ));
        }

        let units = self.fetcher.expand_playlists(&self.playlists).await?;
        let total_units = units.len();
        let outcome = self.fetcher.fetch_all(units).await;

        if !outcome.failed_units.is_empty() {
            warn!(
                stage = %self.descriptor.name,
                failed = outcome.failure_count(),
                units = ?outcome.failed_units,
                "Some work units failed; continuing with partial data"
            );
        }

        // Partial failure is tolerated; total failure is not.
        if outcome.records.is_empty() && outcome.failure_count() > 0 {
            return Err(PipelineError::stage_failure(
                &self.descriptor.name,
                format!("all {} work units failed", outcome.failure_count()),
            ));
        }

        let artifact = TableArtifact::from_records(&outcome.records);
        cache.save(&artifact, &self.output)?;

        info!(
            stage = %self.descriptor.name,
            units = total_units,
            records = outcome.records.len(),
            failed_units = outcome.failure_count(),
            output = %self.output.display(),
            "Ingestion complete"
        );
        Ok(())
    }
}

// ============================================================================
// Stage Construction
// ============================================================================

/// Materialize the configured stage list into runnable stages.
pub fn build_stages(
    config: &PipelineConfig,
    api: Arc<dyn CommentApi>,
) -> Result<Vec<Box<dyn Stage>>> {
    let retry = Arc::new(RetryExecutor::new(
        Arc::new(RateLimiter::new(config.rate_limit())),
        config.retry_policy(),
    ));

    let mut stages: Vec<Box<dyn Stage>> = Vec::with_capacity(config.stages.len());
    for spec in &config.stages {
        let descriptor = StageDescriptor {
            name: spec.name.clone(),
            inputs: spec.inputs.clone(),
            output: spec.output.clone(),
            critical: spec.critical,
        };

        if spec.is_builtin_ingest() {
            let output = spec.output.clone().ok_or_else(|| {
                PipelineError::Config(format!(
                    "ingest stage '{}' needs an output artifact",
                    spec.name
                ))
            })?;
            let fetcher =
                ConcurrentFetcher::new(api.clone(), retry.clone(), config.fetcher_config())?;
            stages.push(Box::new(IngestStage::new(
                descriptor,
                fetcher,
                config.playlists.clone(),
                output,
            )));
        } else {
            let program = spec.command[0].clone();
            let args = spec.command[1..].to_vec();
            stages.push(Box::new(CommandStage::new(descriptor, program, args)));
        }
    }

    Ok(stages)
}
