//! # SaaS Funding News
//!
//! A batch pipeline that scrapes funding announcements from a news site,
//! asks a language model to turn them into CSV records, and compiles the
//! records into one report.
//!
//! ## Usage
//!
//! ```sh
//! ANTHROPIC_API_KEY=... saas_funding_news
//! saas_funding_news report
//! ```
//!
//! ## Architecture
//!
//! Four stages run strictly in sequence; each reads the directory the
//! previous one wrote:
//! 1. **Fetch**: listing pages and articles → `data/contents/page_<N>/<slug>.txt`
//! 2. **Merge**: one bundle per page → `data/merged_contents/page_<N>.txt`
//! 3. **Extract**: one model call per bundle → `data/analyzed_contents/page_<N>_analysis.txt`
//! 4. **Report**: all rows under one header → `data/reports/report.txt`

use clap::Parser;
use std::error::Error;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod errors;
mod extractor;
mod fetcher;
mod merger;
mod models;
mod reporter;
mod scrapers;
mod utils;

use cli::{Cli, Command};
use config::PipelineConfig;
use errors::PipelineError;
use models::{ReportOutcome, StageSummary};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!("saas_funding_news starting up");

    let args = Cli::parse();
    let command = args.command();
    debug!(?command, config = ?args.config, "Parsed CLI arguments");

    let config = match PipelineConfig::load(args.config.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Could not load configuration");
            return Err(e.into());
        }
    };

    if let Err(e) = run_command(command, &config, args.api_key).await {
        error!(?command, error = %e, "Pipeline stopped");
        return Err(e.into());
    }

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");
    Ok(())
}

async fn run_command(
    command: Command,
    config: &PipelineConfig,
    api_key: Option<String>,
) -> Result<(), PipelineError> {
    match command {
        Command::Run => run_pipeline(config, api_key).await,
        Command::Fetch => fetch(config).await.map(drop),
        Command::Merge => merge(config).await.map(drop),
        Command::Extract => extract(config, api_key).await.map(drop),
        Command::Report => report(config).await.map(drop),
    }
}

async fn run_pipeline(config: &PipelineConfig, api_key: Option<String>) -> Result<(), PipelineError> {
    for dir in config.data_directories() {
        ensure_writable_dir(dir).await?;
    }

    info!("=== Starting SaaS News Pipeline ===");
    fetch(config).await?;
    merge(config).await?;
    extract(config, api_key).await?;
    report(config).await?;
    info!("=== Pipeline Completed ===");
    Ok(())
}

async fn fetch(config: &PipelineConfig) -> Result<StageSummary, PipelineError> {
    info!("Step 1: Web Scraping");
    let t0 = Instant::now();
    let summary = fetcher::run(&config.fetcher).await?;
    log_stage("fetch", &summary, t0);
    Ok(summary)
}

async fn merge(config: &PipelineConfig) -> Result<StageSummary, PipelineError> {
    info!("Step 2: File Merging");
    let t0 = Instant::now();
    let summary = merger::run(&config.merger).await?;
    log_stage("merge", &summary, t0);
    Ok(summary)
}

async fn extract(config: &PipelineConfig, api_key: Option<String>) -> Result<StageSummary, PipelineError> {
    info!("Step 3: Content Analysis");
    let t0 = Instant::now();
    let summary = extractor::run(&config.extractor, api_key).await?;
    log_stage("extract", &summary, t0);
    Ok(summary)
}

async fn report(config: &PipelineConfig) -> Result<ReportOutcome, PipelineError> {
    info!("Step 4: Report Generation");
    let outcome = reporter::run(&config.reporter).await?;
    match &outcome {
        ReportOutcome::Written { path, rows } => {
            info!(path = %path.display(), rows, "Report generation completed");
        }
        ReportOutcome::NoInputFiles | ReportOutcome::Empty => {
            warn!(?outcome, "Failed to generate report");
        }
    }
    Ok(outcome)
}

fn log_stage(stage: &str, summary: &StageSummary, t0: Instant) {
    for skipped in &summary.skipped {
        debug!(stage, unit = %skipped.unit, kind = skipped.error.kind(), "Skipped unit");
    }
    info!(
        stage,
        written = summary.written.len(),
        skipped = summary.skipped.len(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Stage complete"
    );
}
