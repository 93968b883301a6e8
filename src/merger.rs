//! Stage 2: bundle each page's articles into one text file.
//!
//! `page_<N>/*.txt` under the source directory becomes `page_<N>.txt` in the
//! output directory: file contents in filename order, joined by
//! [`ARTICLE_SEPARATOR`]. Other entries are ignored, and a page directory
//! without `.txt` files produces nothing.

use crate::config::MergerConfig;
use crate::errors::PipelineError;
use crate::models::{ARTICLE_SEPARATOR, StageSummary};
use crate::utils::{create_dir, sorted_entries};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

static PAGE_DIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^page_\d+$").unwrap());

/// Merge every page directory under `config.source_directory`.
#[instrument(level = "info", skip_all, fields(source = %config.source_directory.display()))]
pub async fn run(config: &MergerConfig) -> Result<StageSummary, PipelineError> {
    create_dir(&config.output_directory).await?;

    let page_dirs = sorted_entries(&config.source_directory, |name, path| {
        PAGE_DIR.is_match(name) && path.is_dir()
    })
    .await?;

    let mut summary = StageSummary::default();
    for (name, path) in page_dirs {
        if let Some(output) = merge_page(&name, &path, &config.output_directory).await? {
            summary.record_written(output);
        }
    }

    info!(merged = summary.written.len(), "Merger finished");
    Ok(summary)
}

/// Merge one page directory. Returns `None` when it holds no `.txt` files.
#[instrument(level = "info", skip(page_path, output_dir))]
pub async fn merge_page(
    page_name: &str,
    page_path: &Path,
    output_dir: &Path,
) -> Result<Option<PathBuf>, PipelineError> {
    let files = sorted_entries(page_path, |name, path| {
        name.ends_with(".txt") && path.is_file()
    })
    .await?;
    if files.is_empty() {
        info!("No text files found, skipping");
        return Ok(None);
    }

    let mut contents = Vec::with_capacity(files.len());
    for (_, path) in &files {
        let text = fs::read_to_string(path)
            .await
            .map_err(|e| PipelineError::io(path, e))?;
        contents.push(text);
    }

    let output = output_dir.join(format!("{page_name}.txt"));
    fs::write(&output, contents.join(ARTICLE_SEPARATOR))
        .await
        .map_err(|e| PipelineError::io(&output, e))?;
    info!(files = files.len(), path = %output.display(), "Merged page");
    Ok(Some(output))
}
