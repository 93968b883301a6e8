//! Helpers for filenames, logging and directory handling.
//!
//! - Title to filename conversion for scraped articles
//! - String truncation for logging model responses
//! - Deterministic (sorted) directory listings used by every stage
//! - Output directory validation before a full run

use crate::errors::PipelineError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs as stdfs;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

static NON_FILENAME_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static SEPARATOR_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());

/// Convert an article title to the name of the file it is stored in.
///
/// Everything except word characters, whitespace and hyphens is dropped, runs
/// of whitespace/hyphens become a single underscore, the result is lowercased
/// and gets a `.txt` extension.
///
/// ```ignore
/// assert_eq!(clean_filename("Acme Raises $5M Seed"), "acme_raises_5m_seed.txt");
/// ```
pub fn clean_filename(title: &str) -> String {
    let stripped = NON_FILENAME_CHARS.replace_all(title, "");
    let joined = SEPARATOR_RUNS.replace_all(&stripped, "_");
    let mut name = joined.trim_matches('-').to_lowercase();
    name.push_str(".txt");
    name
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a character boundary) with
/// an ellipsis and byte count appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// List the entries of `dir` whose file name satisfies `keep`, sorted by name.
///
/// # Arguments
///
/// * `dir` - Directory to list; it must exist
/// * `keep` - Called with each entry's file name and full path
///
/// # Returns
///
/// `(file_name, full_path)` pairs in lexicographic name order. Names that are
/// not valid UTF-8 are skipped.
pub async fn sorted_entries<F>(dir: &Path, keep: F) -> Result<Vec<(String, PathBuf)>, PipelineError>
where
    F: Fn(&str, &Path) -> bool,
{
    let mut reader = fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::io(dir, e))?;
    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| PipelineError::io(dir, e))?
    {
        let path = entry.path();
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if keep(&name, &path) {
            entries.push((name, path));
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

/// Create `path` (and parents) if needed.
pub async fn create_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| PipelineError::io(path, e))
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then writes and removes a probe
/// file.
///
/// # Arguments
///
/// * `path` - Directory to check
///
/// # Returns
///
/// `Ok(())` if the directory is usable, otherwise the [`PipelineError::Io`]
/// for the step that failed.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), PipelineError> {
    create_dir(path).await?;
    let probe_path = path.join("..__probe_write__");
    // std fs keeps the error surface small here
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(PipelineError::io(path, e)),
    }
}
