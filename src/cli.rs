//! Command-line interface definitions.
//!
//! With no subcommand the whole pipeline runs. Each stage can also run on
//! its own against the directories of the active configuration.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Full pipeline with built-in defaults
/// saas_funding_news
///
/// # Only rebuild the report
/// saas_funding_news report
///
/// # Custom page range and model from a YAML file
/// saas_funding_news --config pipeline.yaml run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Anthropic API key used by the extractor
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Pipeline stages.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run all four stages in order (default)
    Run,
    /// Scrape listing pages and articles
    Fetch,
    /// Merge each page's articles into one file
    Merge,
    /// Extract funding records with the language model
    Extract,
    /// Combine extraction results into the CSV report
    Report,
}

impl Cli {
    /// The stage to run; the full pipeline when none was given.
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }
}
