//! Stage 4: concatenate every analysis file into one CSV report.
//!
//! Files matching `*_analysis.txt` are read in filename order. Blank lines
//! are dropped and the rest trimmed. The first line of the first non-blank
//! file becomes the report header; the first line of every file is dropped
//! and all later lines are kept as data rows. Differing headers are logged
//! but not reconciled.

use crate::config::ReporterConfig;
use crate::errors::PipelineError;
use crate::models::{ReportOutcome, funding_header};
use crate::utils::{create_dir, sorted_entries};
use tokio::fs;
use tracing::{info, instrument, warn};

const ANALYSIS_SUFFIX: &str = "_analysis.txt";

/// Combined report text built from analysis files.
#[derive(Debug, Default, PartialEq)]
pub struct Report {
    pub header: Option<String>,
    pub rows: Vec<String>,
}

impl Report {
    /// Fold one analysis file into the report.
    pub fn add_file(&mut self, name: &str, text: &str) {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        let Some(first) = lines.next() else {
            info!(file = %name, "Analysis file is blank");
            return;
        };
        match &self.header {
            None => self.header = Some(first.to_string()),
            Some(header) if header != first => {
                warn!(file = %name, header = %first, "Header differs from the first file");
            }
            Some(_) => {}
        }
        self.rows.extend(lines.map(str::to_string));
    }

    /// The report text: header, then rows, joined by single newlines.
    pub fn render(&self) -> Option<String> {
        let header = self.header.as_ref()?;
        let mut out = header.clone();
        for row in &self.rows {
            out.push('\n');
            out.push_str(row);
        }
        Some(out)
    }
}

/// Build and write the report.
///
/// # Returns
///
/// * [`ReportOutcome::Written`] with the report path and data row count
/// * [`ReportOutcome::NoInputFiles`] when the input directory is missing or
///   holds no `*_analysis.txt` files; nothing is written
/// * [`ReportOutcome::Empty`] when every analysis file is blank
#[instrument(level = "info", skip_all, fields(input = %config.input_directory.display()))]
pub async fn run(config: &ReporterConfig) -> Result<ReportOutcome, PipelineError> {
    let files = if config.input_directory.is_dir() {
        sorted_entries(&config.input_directory, |name, path| {
            name.ends_with(ANALYSIS_SUFFIX) && path.is_file()
        })
        .await?
    } else {
        Vec::new()
    };
    if files.is_empty() {
        warn!("No analysis files found!");
        return Ok(ReportOutcome::NoInputFiles);
    }

    let mut report = Report::default();
    for (name, path) in &files {
        info!(file = %name, "Processing");
        let text = fs::read_to_string(path)
            .await
            .map_err(|e| PipelineError::io(path, e))?;
        report.add_file(name, &text);
    }

    let Some(content) = report.render() else {
        warn!(files = files.len(), "Analysis files are all blank; no report written");
        return Ok(ReportOutcome::Empty);
    };
    if report.header.as_deref() != Some(funding_header().as_str()) {
        warn!(header = ?report.header, "Report header does not match the expected columns");
    }

    create_dir(&config.output_directory).await?;
    let path = config.report_path();
    fs::write(&path, content)
        .await
        .map_err(|e| PipelineError::io(&path, e))?;
    info!(path = %path.display(), rows = report.rows.len(), "Report saved");
    Ok(ReportOutcome::Written {
        path,
        rows: report.rows.len(),
    })
}
