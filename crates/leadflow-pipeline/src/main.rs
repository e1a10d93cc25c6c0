//! Leadflow pipeline binary
//!
//! Runs the configured stage sequence and exits 0 only when every
//! critical stage succeeded.

use clap::Parser;
use leadflow_common::logging::{init_logging, LogConfig, LogLevel};
use leadflow_ingest::youtube::YouTubeClient;
use leadflow_pipeline::cache::ContentCache;
use leadflow_pipeline::config::PipelineConfig;
use leadflow_pipeline::orchestrator::PipelineOrchestrator;
use leadflow_pipeline::stage::build_stages;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "leadflow",
    about = "YouTube comment lead-generation pipeline",
    version
)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Playlist id to ingest (repeatable); overrides the configuration
    #[arg(long = "playlist")]
    playlists: Vec<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env()?;
    if cli.verbose {
        log_config = log_config.with_level(LogLevel::Debug);
    }
    init_logging(&log_config)?;

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    config.apply_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if !cli.playlists.is_empty() {
        config.playlists = cli.playlists.clone();
    }
    config.validate()?;

    let api = Arc::new(YouTubeClient::from_env()?);
    let stages = build_stages(&config, api)?;
    let orchestrator = PipelineOrchestrator::new(stages, Arc::new(ContentCache::new()))
        .with_history(config.history_file.clone());

    let summary = orchestrator.run().await;
    println!("{}", summary.render());

    std::process::exit(summary.status.exit_code());
}
