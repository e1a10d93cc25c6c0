//! Pipeline configuration
//!
//! Configuration is layered: built-in defaults, then an optional JSON
//! file, then environment variable overrides. Ingestion tuning (rate
//! limit, retries, worker pools, timeouts) and the stage list both live
//! here so a deployment can reshape the pipeline without a rebuild.

use crate::error::{PipelineError, Result};
use leadflow_ingest::fetcher::FetcherConfig;
use leadflow_ingest::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default minimum spacing between API requests in milliseconds.
pub const DEFAULT_RATE_LIMIT_MS: u64 = 100;

/// One stage of the pipeline as configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSpec {
    pub name: String,
    /// Program plus arguments. An empty command selects the built-in
    /// ingestion stage.
    pub command: Vec<String>,
    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub critical: bool,
}

impl Default for StageSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            command: Vec::new(),
            inputs: Vec::new(),
            output: None,
            critical: true,
        }
    }
}

impl StageSpec {
    pub fn is_builtin_ingest(&self) -> bool {
        self.command.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub reports_dir: PathBuf,

    /// Playlist ids to ingest.
    pub playlists: Vec<String>,

    /// Minimum spacing between API requests.
    pub rate_limit_ms: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,

    pub video_workers: usize,
    pub reply_workers: usize,
    pub video_timeout_secs: u64,
    pub reply_timeout_secs: u64,

    /// JSONL file that accumulates one record per run.
    pub history_file: PathBuf,

    pub stages: Vec<StageSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            logs_dir: PathBuf::from("logs"),
            reports_dir: PathBuf::from("reports"),
            playlists: Vec::new(),
            rate_limit_ms: DEFAULT_RATE_LIMIT_MS,
            max_retries: leadflow_ingest::retry::DEFAULT_MAX_RETRIES,
            backoff_ms: leadflow_ingest::retry::DEFAULT_BASE_BACKOFF_MS,
            video_workers: leadflow_ingest::fetcher::DEFAULT_VIDEO_WORKERS,
            reply_workers: leadflow_ingest::fetcher::DEFAULT_REPLY_WORKERS,
            video_timeout_secs: leadflow_ingest::fetcher::DEFAULT_VIDEO_TIMEOUT_SECS,
            reply_timeout_secs: leadflow_ingest::fetcher::DEFAULT_REPLY_TIMEOUT_SECS,
            history_file: PathBuf::from("reports/pipeline_history.jsonl"),
            stages: default_stages(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file. Unspecified fields keep
    /// their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        debug!(path = %path.display(), "Loaded pipeline configuration");
        Ok(config)
    }

    /// Apply environment variable overrides on top of the current values.
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("LEADFLOW_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(playlists) = std::env::var("LEADFLOW_PLAYLISTS") {
            self.playlists = playlists
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(ms) = std::env::var("LEADFLOW_RATE_LIMIT_MS") {
            if let Ok(ms) = ms.parse() {
                self.rate_limit_ms = ms;
            }
        }
        if let Ok(retries) = std::env::var("LEADFLOW_MAX_RETRIES") {
            if let Ok(retries) = retries.parse() {
                self.max_retries = retries;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(PipelineError::Config("no stages configured".to_string()));
        }

        let mut seen = HashSet::new();
        for spec in &self.stages {
            if spec.name.is_empty() {
                return Err(PipelineError::Config(
                    "every stage needs a name".to_string(),
                ));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(PipelineError::Config(format!(
                    "duplicate stage name '{}'",
                    spec.name
                )));
            }
            if spec.is_builtin_ingest() && spec.output.is_none() {
                return Err(PipelineError::Config(format!(
                    "ingest stage '{}' needs an output artifact",
                    spec.name
                )));
            }
        }

        self.fetcher_config()
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        Ok(())
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.backoff_ms))
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            video_workers: self.video_workers,
            reply_workers: self.reply_workers,
            video_timeout: Duration::from_secs(self.video_timeout_secs),
            reply_timeout: Duration::from_secs(self.reply_timeout_secs),
            progress: false,
        }
    }
}

fn command(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

/// The stock lead-generation pipeline: ingest, clean, enrich, analyze
/// objections, qualify and score leads, run analytics, then best-effort
/// visualizations.
fn default_stages() -> Vec<StageSpec> {
    let data = |name: &str| PathBuf::from("data").join(name);

    vec![
        StageSpec {
            name: "ingest".to_string(),
            command: Vec::new(),
            inputs: Vec::new(),
            output: Some(data("comments_data.csv")),
            critical: true,
        },
        StageSpec {
            name: "preprocess".to_string(),
            command: command(&["python3", "scripts/data_preprocessing.py"]),
            inputs: vec![data("comments_data.csv")],
            output: Some(data("comments_data_cleaned.csv")),
            critical: true,
        },
        StageSpec {
            name: "enrich".to_string(),
            command: command(&["python3", "scripts/sentiment_intent_analysis.py"]),
            inputs: vec![data("comments_data_cleaned.csv")],
            output: Some(data("comments_data_enriched.csv")),
            critical: true,
        },
        StageSpec {
            name: "objections".to_string(),
            command: command(&["python3", "scripts/objection_analysis.py"]),
            inputs: vec![data("comments_data_enriched.csv")],
            output: Some(data("objection_analysis.csv")),
            critical: true,
        },
        StageSpec {
            name: "export_leads".to_string(),
            command: command(&["python3", "scripts/export_leads.py"]),
            inputs: vec![data("comments_data_enriched.csv")],
            output: Some(data("qualified_leads.csv")),
            critical: true,
        },
        StageSpec {
            name: "score_leads".to_string(),
            command: command(&["python3", "scripts/predictive_lead_scoring.py"]),
            inputs: vec![data("qualified_leads.csv")],
            output: Some(data("leads_predicted.csv")),
            critical: true,
        },
        StageSpec {
            name: "analytics".to_string(),
            command: command(&["python3", "scripts/analytics_and_alerts.py"]),
            inputs: vec![data("leads_predicted.csv")],
            output: None,
            critical: true,
        },
        StageSpec {
            name: "visualize_cleaned".to_string(),
            command: command(&["python3", "scripts/visualize_cleaned_data.py"]),
            inputs: vec![data("comments_data_cleaned.csv")],
            output: None,
            critical: false,
        },
        StageSpec {
            name: "visualize_enriched".to_string(),
            command: command(&["python3", "scripts/visualize_enriched_data.py"]),
            inputs: vec![data("comments_data_enriched.csv")],
            output: None,
            critical: false,
        },
        StageSpec {
            name: "visualize_leads".to_string(),
            command: command(&["python3", "scripts/visualize_predicted_leads.py"]),
            inputs: vec![data("leads_predicted.csv")],
            output: None,
            critical: false,
        },
        StageSpec {
            name: "visualize_trends".to_string(),
            command: command(&["python3", "scripts/visualize_lead_trends.py"]),
            inputs: vec![data("leads_predicted.csv")],
            output: None,
            critical: false,
        },
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.stages[0].name, "ingest");
        assert!(config.stages[0].is_builtin_ingest());
        assert!(config.stages.iter().any(|s| !s.critical));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"playlists": ["PLabc"], "rate_limit_ms": 250}"#,
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.playlists, vec!["PLabc".to_string()]);
        assert_eq!(config.rate_limit_ms, 250);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.stages.len(), default_stages().len());
    }

    #[test]
    fn test_duplicate_stage_names_are_rejected() {
        let mut config = PipelineConfig::default();
        config.stages.push(StageSpec {
            name: "ingest".to_string(),
            command: command(&["true"]),
            ..Default::default()
        });
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_ingest_stage_without_output_is_rejected() {
        let mut config = PipelineConfig::default();
        config.stages = vec![StageSpec {
            name: "ingest".to_string(),
            ..Default::default()
        }];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_worker_pools_are_rejected() {
        let mut config = PipelineConfig::default();
        config.reply_workers = config.video_workers;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides_apply() {
        let mut config = PipelineConfig::default();
        std::env::set_var("LEADFLOW_PLAYLISTS", "PLone, PLtwo");
        config.apply_env();
        std::env::remove_var("LEADFLOW_PLAYLISTS");
        assert_eq!(
            config.playlists,
            vec!["PLone".to_string(), "PLtwo".to_string()]
        );
    }
}
