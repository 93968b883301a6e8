//! Error taxonomy for the pipeline.
//!
//! Two levels of failure exist:
//!
//! - [`UnitError`]: one unit of work (a listing page, an article, a merged
//!   page file) failed. Stages log it, record it in their
//!   [`StageSummary`](crate::models::StageSummary) and move on to the next unit.
//! - [`PipelineError`]: the stage itself cannot continue (unreadable input
//!   directory, failed write, bad configuration file).
//!
//! [`ModelError`] describes failed calls to the language model and is carried
//! inside [`UnitError::Model`].

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single unit of work. Never aborts a stage.
#[derive(Debug, Error)]
pub enum UnitError {
    /// The request could not be sent or the body could not be read.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The page was fetched but the expected elements were not found.
    #[error("could not parse {url}: {reason}")]
    Parse { url: String, reason: String },

    /// The language model call failed.
    #[error("model call failed: {0}")]
    Model(#[from] ModelError),

    /// The model answered, but with nothing usable.
    #[error("model returned an empty response for {file}")]
    EmptyResponse { file: String },
}

impl UnitError {
    /// Short, stable name of the failure kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            UnitError::Transport { .. } => "transport",
            UnitError::Status { .. } => "status",
            UnitError::Parse { .. } => "parse",
            UnitError::Model(_) => "model",
            UnitError::EmptyResponse { .. } => "empty_response",
        }
    }
}

/// Failed call to the language model API.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingApiKey,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx answer (authentication, rate limit, invalid request, overload).
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("response contained no content blocks")]
    NoContent,
}

/// Failure that stops a stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },

    /// A configuration value that parsed but cannot be used.
    #[error("invalid setting {key}: {reason}")]
    Setting { key: &'static str, reason: String },

    #[error("could not build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl PipelineError {
    /// Wrap an `io::Error` together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}
