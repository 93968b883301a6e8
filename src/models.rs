//! Data models shared by the pipeline stages.
//!
//! - [`Article`]: one scraped funding announcement, written as one text file
//! - [`StageSummary`]: what a stage wrote and which units it skipped
//! - [`ReportOutcome`]: result of the final aggregation
//! - [`FUNDING_COLUMNS`]: the CSV schema the model is asked to produce

use crate::errors::UnitError;
use std::path::PathBuf;

/// Columns of an extraction record, in the order the model must emit them.
pub const FUNDING_COLUMNS: [&str; 10] = [
    "Company",
    "Company Website",
    "Software Category",
    "Founded",
    "Early Adopters/Customers",
    "Raised Amount",
    "Round Type",
    "Funding Date",
    "Lead Investor",
    "Additional Investors",
];

/// Separator written between consecutive articles of a merged page bundle.
pub const ARTICLE_SEPARATOR: &str = "\n\n----------\n\n";

/// The CSV header line matching [`FUNDING_COLUMNS`].
pub fn funding_header() -> String {
    FUNDING_COLUMNS.join(",")
}

/// A scraped article.
///
/// Created once from an HTTP response, persisted as one file, never changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    /// The URL the article was requested from (before following "Continue reading").
    pub url: String,
    pub title: String,
    /// Author/date line, when the page has one.
    pub byline: Option<String>,
    /// Paragraph blocks separated by blank lines, list items prefixed with `• `.
    pub body_text: String,
}

impl Article {
    /// Render the article as the text stored on disk.
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(self.title.len() + self.body_text.len() + 64);
        text.push_str(&self.title);
        text.push_str("\n\n");
        if let Some(byline) = &self.byline {
            text.push_str(byline);
            text.push_str("\n\n");
        }
        text.push_str(&self.body_text);
        text
    }
}

/// A unit of work that was skipped, with the reason.
#[derive(Debug)]
pub struct Skipped {
    /// The page URL, article URL or file name that failed.
    pub unit: String,
    pub error: UnitError,
}

/// Outcome of one stage run: files produced plus skipped units.
#[derive(Debug, Default)]
pub struct StageSummary {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<Skipped>,
}

impl StageSummary {
    pub fn record_written(&mut self, path: PathBuf) {
        self.written.push(path);
    }

    pub fn record_skipped(&mut self, unit: impl Into<String>, error: UnitError) {
        self.skipped.push(Skipped {
            unit: unit.into(),
            error,
        });
    }

    /// Fold another summary into this one, keeping order.
    pub fn absorb(&mut self, other: StageSummary) {
        self.written.extend(other.written);
        self.skipped.extend(other.skipped);
    }
}

/// Result of the reporter stage.
#[derive(Debug, PartialEq)]
pub enum ReportOutcome {
    /// The report was written with `rows` data lines under one header.
    Written { path: PathBuf, rows: usize },
    /// No `*_analysis.txt` file exists; nothing was written.
    NoInputFiles,
    /// Analysis files exist but all of them are blank; nothing was written.
    Empty,
}
