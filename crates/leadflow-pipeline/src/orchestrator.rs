//! Pipeline orchestration
//!
//! Runs stages strictly in order. After every stage, successful or not,
//! artifact row counts are re-derived from the files on disk so the run
//! record always reflects reality rather than what stages claim. A failed
//! critical stage aborts the run; a failed non-critical stage is recorded
//! and the run continues.

use crate::cache::ContentCache;
use crate::error::Result;
use crate::stage::Stage;
use chrono::{DateTime, Utc};
use colored::Colorize;
use leadflow_common::types::{RunMetrics, RunStatus, StageStatus};
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Outcome of one stage within a run.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub name: String,
    pub status: StageStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One line of the JSONL run history.
#[derive(Debug, Serialize)]
struct RunRecord<'a> {
    run_id: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    status: RunStatus,
    stages: &'a [StageReport],
    metrics: &'a RunMetrics,
}

/// Terminal result of a whole pipeline run.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub duration_ms: u64,
    pub reports: Vec<StageReport>,
    pub metrics: RunMetrics,
}

impl RunSummary {
    /// Human-readable run report for the terminal.
    pub fn render(&self) -> String {
        let mut out = String::new();

        let status = match self.status {
            RunStatus::Completed => "completed".green().bold(),
            RunStatus::Aborted => "aborted".red().bold(),
        };
        let _ = writeln!(
            out,
            "Pipeline run {} {} in {:.1}s",
            self.run_id,
            status,
            self.duration_ms as f64 / 1000.0
        );

        for report in &self.reports {
            let mark = match report.status {
                StageStatus::Succeeded => "✓".green(),
                StageStatus::Failed => "✗".red(),
                StageStatus::Pending => "·".dimmed(),
                StageStatus::Running => "…".yellow(),
            };
            let _ = write!(
                out,
                "  {} {} ({:.1}s)",
                mark,
                report.name,
                report.duration_ms as f64 / 1000.0
            );
            match &report.error {
                Some(err) => {
                    let _ = writeln!(out, ": {}", err.red());
                },
                None => {
                    let _ = writeln!(out);
                },
            }
        }

        if !self.metrics.is_empty() {
            let _ = writeln!(out, "Artifacts:");
            for (artifact, rows) in self.metrics.iter() {
                let _ = writeln!(out, "  {}: {} rows", artifact, rows);
            }
        }

        out
    }
}

/// Runs an ordered list of stages against a shared artifact cache.
pub struct PipelineOrchestrator {
    stages: Vec<Box<dyn Stage>>,
    cache: Arc<ContentCache>,
    history_path: Option<PathBuf>,
}

impl PipelineOrchestrator {
    pub fn new(stages: Vec<Box<dyn Stage>>, cache: Arc<ContentCache>) -> Self {
        Self {
            stages,
            cache,
            history_path: None,
        }
    }

    /// Append a JSONL record per run to the given file.
    pub fn with_history(mut self, path: PathBuf) -> Self {
        self.history_path = Some(path);
        self
    }

    pub async fn run(&self) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let run_clock = Instant::now();
        info!(
            run_id = %run_id,
            stages = self.stages.len(),
            "Pipeline run starting"
        );

        let mut reports = Vec::with_capacity(self.stages.len());
        let mut metrics = RunMetrics::new();
        let mut status = RunStatus::Completed;
        let mut aborted_after = None;

        for (index, stage) in self.stages.iter().enumerate() {
            let descriptor = stage.descriptor();
            info!(stage = %descriptor.name, "Stage starting");

            let clock = Instant::now();
            let result = stage.run(&self.cache).await;
            let duration_ms = clock.elapsed().as_millis() as u64;

            // Counts come from the files, not from the stage, and are
            // refreshed even when the stage just failed.
            metrics = self.collect_metrics();

            match result {
                Ok(()) => {
                    info!(stage = %descriptor.name, duration_ms, "Stage succeeded");
                    reports.push(StageReport {
                        name: descriptor.name.clone(),
                        status: StageStatus::Succeeded,
                        duration_ms,
                        error: None,
                    });
                },
                Err(e) if descriptor.critical => {
                    error!(
                        stage = %descriptor.name,
                        error = %e,
                        "Critical stage failed, aborting run"
                    );
                    reports.push(StageReport {
                        name: descriptor.name.clone(),
                        status: StageStatus::Failed,
                        duration_ms,
                        error: Some(e.to_string()),
                    });
                    status = RunStatus::Aborted;
                    aborted_after = Some(index);
                    break;
                },
                Err(e) => {
                    warn!(
                        stage = %descriptor.name,
                        error = %e,
                        "Non-critical stage failed, continuing"
                    );
                    reports.push(StageReport {
                        name: descriptor.name.clone(),
                        status: StageStatus::Failed,
                        duration_ms,
                        error: Some(e.to_string()),
                    });
                },
            }
        }

        if let Some(index) = aborted_after {
            for stage in &self.stages[index + 1..] {
                reports.push(StageReport {
                    name: stage.descriptor().name.clone(),
                    status: StageStatus::Pending,
                    duration_ms: 0,
                    error: None,
                });
            }
        }

        let finished_at = Utc::now();

        if let Some(path) = &self.history_path {
            let record = RunRecord {
                run_id: run_id.to_string(),
                started_at,
                finished_at,
                status,
                stages: &reports,
                metrics: &metrics,
            };
            // History is best-effort; a full reports directory must not
            // change the run outcome.
            if let Err(e) = append_history(path, &record) {
                warn!(path = %path.display(), error = %e, "Failed to append run history");
            }
        }

        let duration_ms = run_clock.elapsed().as_millis() as u64;
        info!(run_id = %run_id, status = %status, duration_ms, "Pipeline run finished");

        RunSummary {
            run_id,
            status,
            duration_ms,
            reports,
            metrics,
        }
    }

    fn collect_metrics(&self) -> RunMetrics {
        let mut metrics = RunMetrics::new();
        for stage in &self.stages {
            if let Some(output) = &stage.descriptor().output {
                let key = output
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| output.display().to_string());
                // A missing or unreadable artifact counts as zero rows.
                let rows = self
                    .cache
                    .load(output)
                    .map(|artifact| artifact.row_count())
                    .unwrap_or(0);
                metrics.record(key, rows);
            }
        }
        metrics
    }
}

fn append_history(path: &Path, record: &RunRecord<'_>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::artifact::TableArtifact;
    use crate::error::PipelineError;
    use crate::stage::StageDescriptor;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Writes `rows` data rows to its output (if any), then optionally
    /// fails.
    struct ScriptedStage {
        descriptor: StageDescriptor,
        rows: usize,
        fail: bool,
    }

    impl ScriptedStage {
        fn new(name: &str, output: Option<PathBuf>, rows: usize, critical: bool, fail: bool) -> Self {
            Self {
                descriptor: StageDescriptor {
                    name: name.to_string(),
                    inputs: vec![],
                    output,
                    critical,
                },
                rows,
                fail,
            }
        }
    }

    #[async_trait]
    impl Stage for ScriptedStage {
        fn descriptor(&self) -> &StageDescriptor {
            &self.descriptor
        }

        async fn run(&self, _cache: &ContentCache) -> crate::error::Result<()> {
            if let Some(output) = &self.descriptor.output {
                let mut artifact = TableArtifact::new(vec!["n".to_string()]);
                for i in 0..self.rows {
                    artifact.rows.push(vec![i.to_string()]);
                }
                artifact.write_csv(output)?;
            }
            if self.fail {
                return Err(PipelineError::stage_failure(
                    &self.descriptor.name,
                    "scripted failure",
                ));
            }
            Ok(())
        }
    }

    fn orchestrator(stages: Vec<Box<dyn Stage>>) -> PipelineOrchestrator {
        PipelineOrchestrator::new(stages, Arc::new(ContentCache::new()))
    }

    #[tokio::test]
    async fn test_noncritical_failure_does_not_stop_the_run() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.csv");
        let d = dir.path().join("d.csv");

        let summary = orchestrator(vec![
            Box::new(ScriptedStage::new("a", Some(a.clone()), 2, true, false)),
            Box::new(ScriptedStage::new("b", None, 0, true, false)),
            Box::new(ScriptedStage::new("c", None, 0, false, true)),
            Box::new(ScriptedStage::new("d", Some(d.clone()), 3, true, false)),
        ])
        .run()
        .await;

        assert_eq!(summary.status, RunStatus::Completed);
        let statuses: Vec<_> = summary.reports.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                StageStatus::Succeeded,
                StageStatus::Succeeded,
                StageStatus::Failed,
                StageStatus::Succeeded,
            ]
        );
        assert_eq!(summary.metrics.get("a.csv"), Some(2));
        assert_eq!(summary.metrics.get("d.csv"), Some(3));
    }

    #[tokio::test]
    async fn test_critical_failure_aborts_and_skips_the_rest() {
        let dir = TempDir::new().unwrap();
        let never = dir.path().join("never.csv");

        let summary = orchestrator(vec![
            Box::new(ScriptedStage::new("a", None, 0, true, true)),
            Box::new(ScriptedStage::new("b", Some(never.clone()), 5, true, false)),
        ])
        .run()
        .await;

        assert_eq!(summary.status, RunStatus::Aborted);
        assert_eq!(summary.status.exit_code(), 1);
        assert_eq!(summary.reports[0].status, StageStatus::Failed);
        assert_eq!(summary.reports[1].status, StageStatus::Pending);
        // The stage after the abort never executed.
        assert!(!never.exists());
        assert_eq!(summary.metrics.get("never.csv"), Some(0));
    }

    #[tokio::test]
    async fn test_metrics_are_refreshed_after_a_failed_stage() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("partial.csv");

        // The stage writes its artifact and then fails.
        let summary = orchestrator(vec![Box::new(ScriptedStage::new(
            "flaky",
            Some(out),
            7,
            true,
            true,
        ))])
        .run()
        .await;

        assert_eq!(summary.status, RunStatus::Aborted);
        assert_eq!(summary.metrics.get("partial.csv"), Some(7));
    }

    #[tokio::test]
    async fn test_history_appends_one_line_per_run() {
        let dir = TempDir::new().unwrap();
        let history = dir.path().join("reports").join("history.jsonl");

        for _ in 0..2 {
            let summary = PipelineOrchestrator::new(
                vec![Box::new(ScriptedStage::new("a", None, 0, true, false))],
                Arc::new(ContentCache::new()),
            )
            .with_history(history.clone())
            .run()
            .await;
            assert_eq!(summary.status, RunStatus::Completed);
        }

        let contents = std::fs::read_to_string(&history).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["status"], "completed");
            assert!(value["run_id"].is_string());
            assert_eq!(value["stages"][0]["name"], "a");
        }
    }

    #[tokio::test]
    async fn test_render_mentions_every_stage() {
        let summary = orchestrator(vec![
            Box::new(ScriptedStage::new("ingest", None, 0, true, false)),
            Box::new(ScriptedStage::new("visualize", None, 0, false, true)),
        ])
        .run()
        .await;

        let rendered = summary.render();
        assert!(rendered.contains("ingest"));
        assert!(rendered.contains("visualize"));
        assert!(rendered.contains("scripted failure"));
    }
}
