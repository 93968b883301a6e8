//! Pipeline configuration.
//!
//! A [`PipelineConfig`] is built once per run, either from the built-in
//! defaults or from a YAML file passed with `--config`, and is then only ever
//! borrowed by the stages. Keys missing from the file keep their defaults.
//!
//! ```yaml
//! fetcher:
//!   base_url: https://www.thesaasnews.com/news/seed-round
//!   start_page: 1
//!   end_page: 5
//! extractor:
//!   model: claude-3-5-sonnet-latest
//! ```

use crate::errors::PipelineError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

/// Complete configuration for one run of the pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub fetcher: FetcherConfig,
    pub merger: MergerConfig,
    pub extractor: ExtractorConfig,
    pub reporter: ReporterConfig,
}

/// Listing pagination, rate limiting and the URL denylist.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub base_url: String,
    pub start_page: u32,
    pub end_page: u32,
    /// Sleep before every listing page request, in seconds.
    pub delay_between_pages: f64,
    /// Sleep before every article request, in seconds.
    pub delay_between_articles: f64,
    /// Per-request timeout, in seconds.
    pub request_timeout: u64,
    pub data_dir: PathBuf,
    pub excluded_urls: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.thesaasnews.com/news/seed-round".to_string(),
            start_page: 1,
            end_page: 2,
            delay_between_pages: 2.0,
            delay_between_articles: 1.0,
            request_timeout: 30,
            data_dir: PathBuf::from("data/contents"),
            excluded_urls: [
                "growth-round",
                "private-equity-investment",
                "series-a",
                "series-b",
                "series-c",
                "series-d",
                "series-e",
                "series-f",
            ]
            .iter()
            .map(|slug| format!("thesaasnews.com/news/{slug}"))
            .collect(),
        }
    }
}

impl FetcherConfig {
    /// Sleep before each listing request. Values [`PipelineConfig::from_yaml`]
    /// would reject (negative, non-finite, too large) count as zero.
    pub fn page_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay_between_pages).unwrap_or_default()
    }

    /// Sleep before each article request, with the same fallback as [`Self::page_delay`].
    pub fn article_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay_between_articles).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MergerConfig {
    pub source_directory: PathBuf,
    pub output_directory: PathBuf,
}

impl Default for MergerConfig {
    fn default() -> Self {
        Self {
            source_directory: PathBuf::from("data/contents"),
            output_directory: PathBuf::from("data/merged_contents"),
        }
    }
}

/// Model settings and the directories the extractor reads from and writes to.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub api_base: String,
    pub input_directory: PathBuf,
    pub output_directory: PathBuf,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-latest".to_string(),
            max_tokens: 8000,
            temperature: 0.0,
            api_base: "https://api.anthropic.com".to_string(),
            input_directory: PathBuf::from("data/merged_contents"),
            output_directory: PathBuf::from("data/analyzed_contents"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    pub input_directory: PathBuf,
    pub output_directory: PathBuf,
    pub output_filename: String,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            input_directory: PathBuf::from("data/analyzed_contents"),
            output_directory: PathBuf::from("data/reports"),
            output_filename: "report.txt".to_string(),
        }
    }
}

impl ReporterConfig {
    pub fn report_path(&self) -> PathBuf {
        self.output_directory.join(&self.output_filename)
    }
}

impl PipelineConfig {
    /// Parse a configuration from YAML text.
    pub fn from_yaml(text: &str, origin: &Path) -> Result<Self, PipelineError> {
        let config: PipelineConfig =
            serde_yaml::from_str(text).map_err(|e| PipelineError::Config {
                path: origin.to_path_buf(),
                reason: e.to_string(),
            })?;
        config.validate(origin)?;
        Ok(config)
    }

    /// Load the configuration file at `path`, or the defaults when `path` is `None`.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        let Some(path) = path else {
            info!("Using built-in configuration");
            return Ok(Self::default());
        };
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PipelineError::io(path, e))?;
        let config = Self::from_yaml(&text, path)?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// The four directories a full run writes into, in stage order.
    pub fn data_directories(&self) -> [&Path; 4] {
        [
            self.fetcher.data_dir.as_path(),
            self.merger.output_directory.as_path(),
            self.extractor.output_directory.as_path(),
            self.reporter.output_directory.as_path(),
        ]
    }

    fn validate(&self, origin: &Path) -> Result<(), PipelineError> {
        let invalid = |reason: String| PipelineError::Config {
            path: origin.to_path_buf(),
            reason,
        };
        if url::Url::parse(&self.fetcher.base_url).is_err() {
            return Err(invalid(format!(
                "fetcher.base_url is not an absolute URL: {}",
                self.fetcher.base_url
            )));
        }
        for (key, secs) in [
            ("fetcher.delay_between_pages", self.fetcher.delay_between_pages),
            ("fetcher.delay_between_articles", self.fetcher.delay_between_articles),
        ] {
            if let Err(e) = Duration::try_from_secs_f64(secs) {
                return Err(invalid(format!("{key} is not a usable delay ({secs}): {e}")));
            }
        }
        if self.fetcher.start_page == 0 {
            return Err(invalid("fetcher.start_page must be at least 1".into()));
        }
        if self.extractor.max_tokens == 0 {
            return Err(invalid("extractor.max_tokens must be positive".into()));
        }
        if self.reporter.output_filename.is_empty() {
            return Err(invalid("reporter.output_filename must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_pipeline_layout() {
        let config = PipelineConfig::default();
        assert_eq!(config.fetcher.start_page, 1);
        assert_eq!(config.fetcher.end_page, 2);
        assert_eq!(config.fetcher.excluded_urls.len(), 8);
        assert!(
            config
                .fetcher
                .excluded_urls
                .contains(&"thesaasnews.com/news/series-a".to_string())
        );
        assert_eq!(config.fetcher.page_delay(), Duration::from_secs(2));
        assert_eq!(config.fetcher.article_delay(), Duration::from_secs(1));
        assert_eq!(config.extractor.max_tokens, 8000);
        assert_eq!(config.extractor.temperature, 0.0);
        assert_eq!(
            config.reporter.report_path(),
            PathBuf::from("data/reports/report.txt")
        );
        assert_eq!(config.merger.source_directory, config.fetcher.data_dir);
        assert_eq!(
            config.extractor.input_directory,
            config.merger.output_directory
        );
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
fetcher:
  end_page: 7
  delay_between_pages: 0.5
extractor:
  model: claude-3-7-sonnet-latest
"#;
        let config = PipelineConfig::from_yaml(yaml, Path::new("test.yaml")).unwrap();
        assert_eq!(config.fetcher.end_page, 7);
        assert_eq!(config.fetcher.start_page, 1);
        assert_eq!(config.fetcher.page_delay(), Duration::from_millis(500));
        assert_eq!(config.extractor.model, "claude-3-7-sonnet-latest");
        assert_eq!(config.extractor.max_tokens, 8000);
        assert_eq!(config.reporter.output_filename, "report.txt");
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = PipelineConfig::from_yaml("fetcher: [1, 2", Path::new("bad.yaml")).unwrap_err();
        assert!(matches!(err, PipelineError::Config { .. }));
    }

    #[test]
    fn test_relative_base_url_rejected() {
        let yaml = "fetcher:\n  base_url: /news/seed-round\n";
        let err = PipelineConfig::from_yaml(yaml, Path::new("bad.yaml")).unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_unusable_delays_rejected() {
        for value in [".inf", "-.inf", ".nan", "-1.5", "1e30"] {
            let yaml = format!("fetcher:\n  delay_between_pages: {value}\n");
            let err = PipelineConfig::from_yaml(&yaml, Path::new("bad.yaml")).unwrap_err();
            assert!(
                err.to_string().contains("fetcher.delay_between_pages"),
                "{value}: {err}"
            );
        }
        let yaml = "fetcher:\n  delay_between_articles: .inf\n";
        let err = PipelineConfig::from_yaml(yaml, Path::new("bad.yaml")).unwrap_err();
        assert!(err.to_string().contains("fetcher.delay_between_articles"));
    }

    #[test]
    fn test_unusable_delay_built_in_code_does_not_panic() {
        let fetcher = FetcherConfig {
            delay_between_pages: f64::INFINITY,
            delay_between_articles: -3.0,
            ..FetcherConfig::default()
        };
        assert_eq!(fetcher.page_delay(), Duration::ZERO);
        assert_eq!(fetcher.article_delay(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_load_without_path_uses_defaults() {
        let config = PipelineConfig::load(None).await.unwrap();
        assert_eq!(config.extractor.model, "claude-3-5-sonnet-latest");
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        let err = PipelineConfig::load(Some(missing.as_path())).await.unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
