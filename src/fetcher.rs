//! Stage 1: scrape listing pages and their articles to disk.
//!
//! For each page number in the configured range the fetcher
//!
//! 1. creates `<data_dir>/page_<N>/`,
//! 2. downloads the listing page (`?page=N` for N > 1) and collects article links,
//! 3. downloads every article, following "Continue reading" once,
//! 4. writes each article to `page_<N>/<slug>.txt`.
//!
//! A listing page without article links ends the run: it is taken as the end
//! of the listing. A failed listing request counts as such a page. Failed
//! articles are logged and skipped.

use crate::config::FetcherConfig;
use crate::errors::{PipelineError, UnitError};
use crate::models::{Article, StageSummary};
use crate::scrapers::{SiteStrategy, strategy_for};
use crate::utils::{clean_filename, create_dir};
use itertools::Itertools;
use scraper::Html;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Source of HTML pages.
///
/// The HTTP implementation is [`HttpPageSource`]; tests substitute canned pages.
pub trait PageSource {
    /// GET `url` and return the response body.
    async fn get(&self, url: &str) -> Result<String, UnitError>;
}

/// [`PageSource`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    pub fn new(timeout: Duration) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl PageSource for HttpPageSource {
    #[instrument(level = "debug", skip(self))]
    async fn get(&self, url: &str) -> Result<String, UnitError> {
        let transport = |source| UnitError::Transport {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(UnitError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await.map_err(transport)?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

/// Result of processing one listing page.
#[derive(Debug, Default)]
pub struct PageReport {
    pub page: u32,
    /// Article links left after filtering; zero ends the run.
    pub links: usize,
    pub summary: StageSummary,
}

/// URL of listing page `page`: the base URL itself for page 1, `page=N` otherwise.
pub fn page_url(base: &Url, page: u32) -> Url {
    let mut url = base.clone();
    if page > 1 {
        url.query_pairs_mut().append_pair("page", &page.to_string());
    }
    url
}

/// True when `url` contains any denylisted substring, ignoring case.
pub fn is_excluded(url: &str, excluded: &[String]) -> bool {
    let url = url.to_lowercase();
    excluded
        .iter()
        .any(|pattern| url.contains(&pattern.to_lowercase()))
}

/// Drop pagination links and denylisted URLs, then deduplicate keeping first-seen order.
pub fn filter_links(candidates: Vec<String>, excluded: &[String]) -> Vec<String> {
    candidates
        .into_iter()
        .filter(|url| !url.contains("page="))
        .filter(|url| !is_excluded(url, excluded))
        .unique()
        .collect()
}

/// Run the fetcher against the live site named by `config.base_url`.
///
/// # Arguments
///
/// * `config` - Page range, delays, denylist and output directory
///
/// # Returns
///
/// The articles written and the units skipped over the whole page range.
///
/// # Errors
///
/// [`PipelineError::Setting`] when the base URL does not parse or no
/// [`SiteStrategy`] knows its host, and [`PipelineError::Io`] when the data
/// directory cannot be written.
#[instrument(level = "info", skip_all, fields(base_url = %config.base_url))]
pub async fn run(config: &FetcherConfig) -> Result<StageSummary, PipelineError> {
    let base = Url::parse(&config.base_url).map_err(|e| PipelineError::Setting {
        key: "fetcher.base_url",
        reason: e.to_string(),
    })?;
    let strategy = strategy_for(&base).ok_or_else(|| PipelineError::Setting {
        key: "fetcher.base_url",
        reason: format!("no scraping strategy for host {:?}", base.host_str()),
    })?;
    let source = HttpPageSource::new(Duration::from_secs(config.request_timeout))?;
    fetch_pages(&source, strategy, &base, config).await
}

/// Walk the configured page range until a page yields no article links.
///
/// `base` is the parsed `config.base_url`; listing URLs are derived from it
/// with [`page_url`] and relative article links are resolved against it.
#[instrument(level = "info", skip_all, fields(source = strategy.name()))]
pub async fn fetch_pages<S: PageSource>(
    source: &S,
    strategy: &dyn SiteStrategy,
    base: &Url,
    config: &FetcherConfig,
) -> Result<StageSummary, PipelineError> {
    create_dir(&config.data_dir).await?;

    let mut summary = StageSummary::default();
    for page in config.start_page..=config.end_page {
        info!(page, "Processing page");
        let report = process_page(source, strategy, config, base, page).await?;
        let links = report.links;
        let saved = report.summary.written.len();
        summary.absorb(report.summary);
        if links == 0 {
            info!(page = report.page, "No articles found, stopping");
            break;
        }
        info!(page = report.page, links, saved, "Page complete");
    }

    info!(
        written = summary.written.len(),
        skipped = summary.skipped.len(),
        "Fetcher finished"
    );
    Ok(summary)
}

/// Scrape one listing page and save its articles into `page_<N>/`.
#[instrument(level = "info", skip_all, fields(page = page))]
pub async fn process_page<S: PageSource>(
    source: &S,
    strategy: &dyn SiteStrategy,
    config: &FetcherConfig,
    base: &Url,
    page: u32,
) -> Result<PageReport, PipelineError> {
    let page_dir = config.data_dir.join(format!("page_{page}"));
    create_dir(&page_dir).await?;

    let mut report = PageReport {
        page,
        ..Default::default()
    };

    let listing_url = page_url(base, page);
    let links = match scrape_listing(source, strategy, config, base, &listing_url).await {
        Ok(links) => links,
        Err(e) => {
            error!(page, url = %listing_url, kind = e.kind(), error = %e, "Listing page failed");
            report.summary.record_skipped(listing_url.as_str(), e);
            return Ok(report);
        }
    };

    report.links = links.len();
    if links.is_empty() {
        return Ok(report);
    }
    info!(page, count = links.len(), "Found articles");

    for (i, url) in links.iter().enumerate() {
        info!(page, index = i + 1, total = links.len(), %url, "Processing article");
        match scrape_article(source, strategy, config.article_delay(), url).await {
            Ok(article) => {
                let path = save_article(&page_dir, &article).await?;
                report.summary.record_written(path);
            }
            Err(e) => {
                warn!(%url, kind = e.kind(), error = %e, "Skipping article");
                report.summary.record_skipped(url.as_str(), e);
            }
        }
    }
    Ok(report)
}

/// Download a listing page and return its filtered article links.
///
/// Sleeps for the configured page delay before the request.
///
/// # Arguments
///
/// * `source` - Where pages come from
/// * `strategy` - Markup rules for the site
/// * `config` - Page delay and URL denylist
/// * `base` - Base URL used to resolve relative links
/// * `listing_url` - The listing page to download
///
/// # Returns
///
/// Absolute article URLs in document order, without pagination links,
/// denylisted URLs or duplicates. An empty vector marks the end of the listing.
pub async fn scrape_listing<S: PageSource>(
    source: &S,
    strategy: &dyn SiteStrategy,
    config: &FetcherConfig,
    base: &Url,
    listing_url: &Url,
) -> Result<Vec<String>, UnitError> {
    sleep(config.page_delay()).await;
    let html = source.get(listing_url.as_str()).await?;
    let candidates = {
        let document = Html::parse_document(&html);
        strategy.article_links(&document, base)
    };
    let links = filter_links(candidates, &config.excluded_urls);
    debug!(links = ?links, "Article links");
    Ok(links)
}

/// Download one article, following the "Continue reading" link if present.
///
/// Sleeps for `delay` before the first request only. The title comes from the
/// landing page; byline and body come from the page the continue link points
/// to, or from the landing page when there is no such link.
///
/// # Errors
///
/// [`UnitError::Parse`] for an unparsable URL or a missing or empty title,
/// and any error from `source`.
#[instrument(level = "info", skip(source, strategy, delay))]
pub async fn scrape_article<S: PageSource>(
    source: &S,
    strategy: &dyn SiteStrategy,
    delay: Duration,
    url: &str,
) -> Result<Article, UnitError> {
    let parse_error = |reason: &str| UnitError::Parse {
        url: url.to_string(),
        reason: reason.to_string(),
    };
    let page_url = Url::parse(url).map_err(|e| parse_error(&e.to_string()))?;

    sleep(delay).await;
    let landing = source.get(url).await?;
    let (title, continue_url) = {
        let document = Html::parse_document(&landing);
        (
            strategy.title(&document),
            strategy.continue_link(&document, &page_url),
        )
    };
    let title = title.ok_or_else(|| parse_error("no <h1> element"))?;
    if title.is_empty() {
        return Err(parse_error("empty title"));
    }

    let full = match continue_url {
        Some(full_url) => {
            debug!(%full_url, "Following continue reading link");
            source.get(full_url.as_str()).await?
        }
        None => landing,
    };
    let document = Html::parse_document(&full);
    Ok(Article {
        url: url.to_string(),
        title,
        byline: strategy.byline(&document),
        body_text: strategy.body(&document),
    })
}

async fn save_article(page_dir: &Path, article: &Article) -> Result<PathBuf, PipelineError> {
    let filename = clean_filename(&article.title);
    let path = page_dir.join(&filename);
    tokio::fs::write(&path, article.to_text())
        .await
        .map_err(|e| PipelineError::io(&path, e))?;
    info!(file = %filename, url = %article.url, "Saved article");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::saasnews::SaasNews;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tokio::time::Instant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BASE: &str = "https://www.thesaasnews.com/news/seed-round";

    /// Canned pages keyed by URL; anything else answers 404.
    #[derive(Default)]
    struct FakeSource {
        pages: HashMap<String, String>,
        requests: RefCell<Vec<String>>,
        sent_at: RefCell<Vec<Instant>>,
    }

    impl FakeSource {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }
    }

    impl PageSource for FakeSource {
        async fn get(&self, url: &str) -> Result<String, UnitError> {
            self.requests.borrow_mut().push(url.to_string());
            self.sent_at.borrow_mut().push(Instant::now());
            self.pages.get(url).cloned().ok_or(UnitError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn base() -> Url {
        Url::parse(BASE).unwrap()
    }

    fn test_config(data_dir: &Path, end_page: u32) -> FetcherConfig {
        FetcherConfig {
            end_page,
            delay_between_pages: 0.0,
            delay_between_articles: 0.0,
            data_dir: data_dir.to_path_buf(),
            ..FetcherConfig::default()
        }
    }

    #[test]
    fn test_page_url() {
        let base = Url::parse(BASE).unwrap();
        assert_eq!(page_url(&base, 1).as_str(), BASE);
        assert_eq!(
            page_url(&base, 3).as_str(),
            "https://www.thesaasnews.com/news/seed-round?page=3"
        );
    }

    #[test]
    fn test_denylist_beats_news_match() {
        let excluded = FetcherConfig::default().excluded_urls;
        let candidates = vec![
            "https://www.thesaasnews.com/news/acme-raises-5m".to_string(),
            "https://www.TheSaaSNews.com/news/Series-A".to_string(),
            "https://www.thesaasnews.com/news/series-b".to_string(),
            "https://www.thesaasnews.com/news/seed-round?page=2".to_string(),
            "https://www.thesaasnews.com/news/acme-raises-5m".to_string(),
            "https://www.thesaasnews.com/news/zeta-lands-2m".to_string(),
        ];
        assert_eq!(
            filter_links(candidates, &excluded),
            vec![
                "https://www.thesaasnews.com/news/acme-raises-5m",
                "https://www.thesaasnews.com/news/zeta-lands-2m",
            ]
        );
    }

    #[tokio::test]
    async fn test_scrape_article_follows_continue_reading() {
        let source = FakeSource::default()
            .with(
                "https://www.thesaasnews.com/news/acme",
                r#"<h1>Acme Raises $5M</h1><a href="/full/acme">Continue reading</a>"#,
            )
            .with(
                "https://www.thesaasnews.com/full/acme",
                r#"<h1>ignored</h1><div>By Jane Doe</div><article><p>Body.</p></article>"#,
            );
        let article = scrape_article(
            &source,
            &SaasNews,
            Duration::ZERO,
            "https://www.thesaasnews.com/news/acme",
        )
        .await
        .unwrap();

        assert_eq!(article.title, "Acme Raises $5M");
        assert_eq!(article.byline.as_deref(), Some("By Jane Doe"));
        assert_eq!(article.body_text, "Body.\n\n");
        assert_eq!(source.requests.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_scrape_article_without_title_is_parse_error() {
        let source = FakeSource::default().with(
            "https://www.thesaasnews.com/news/untitled",
            "<article><p>Body.</p></article>",
        );
        let err = scrape_article(
            &source,
            &SaasNews,
            Duration::ZERO,
            "https://www.thesaasnews.com/news/untitled",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UnitError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_fetch_pages_skips_failures_and_stops_on_empty_page() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), 5);
        let source = FakeSource::default()
            .with(
                BASE,
                r#"<a href="/news/acme">Acme</a>
                   <a href="/news/series-a">Series A</a>
                   <a href="/news/missing">Missing</a>"#,
            )
            .with(
                "https://www.thesaasnews.com/news/acme",
                "<h1>Acme Raises $5M</h1><article><p>Seed round.</p></article>",
            )
            .with(
                "https://www.thesaasnews.com/news/seed-round?page=2",
                r#"<a href="/about">About</a>"#,
            );

        let summary = fetch_pages(&source, &SaasNews, &base(), &config).await.unwrap();

        let saved = dir.path().join("page_1").join("acme_raises_5m.txt");
        assert_eq!(summary.written, vec![saved.clone()]);
        assert_eq!(
            std::fs::read_to_string(&saved).unwrap(),
            "Acme Raises $5M\n\nSeed round.\n\n"
        );

        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].unit, "https://www.thesaasnews.com/news/missing");
        assert_eq!(summary.skipped[0].error.kind(), "status");

        let requests = source.requests.borrow();
        assert!(!requests.iter().any(|u| u.contains("series-a")));
        assert!(!requests.iter().any(|u| u.contains("page=3")));
        assert!(dir.path().join("page_2").is_dir());
        assert!(!dir.path().join("page_3").exists());
    }

    #[tokio::test]
    async fn test_sleeps_before_listing_and_each_article() {
        let dir = tempfile::tempdir().unwrap();
        let config = FetcherConfig {
            delay_between_pages: 0.15,
            delay_between_articles: 0.1,
            ..test_config(dir.path(), 1)
        };
        let source = FakeSource::default()
            .with(
                BASE,
                r#"<a href="/news/acme">Acme</a><a href="/news/zeta">Zeta</a>"#,
            )
            .with(
                "https://www.thesaasnews.com/news/acme",
                r#"<h1>Acme</h1><a href="/full/acme">Continue reading</a>"#,
            )
            .with(
                "https://www.thesaasnews.com/full/acme",
                "<article><p>Acme body.</p></article>",
            )
            .with(
                "https://www.thesaasnews.com/news/zeta",
                "<h1>Zeta</h1><article><p>Zeta body.</p></article>",
            );

        let started = Instant::now();
        let summary = fetch_pages(&source, &SaasNews, &base(), &config).await.unwrap();
        assert_eq!(summary.written.len(), 2);

        let requests = source.requests.borrow();
        let sent_at = source.sent_at.borrow();
        assert_eq!(
            *requests,
            vec![
                BASE,
                "https://www.thesaasnews.com/news/acme",
                "https://www.thesaasnews.com/full/acme",
                "https://www.thesaasnews.com/news/zeta",
            ]
        );
        // listing, then each article landing page, waits its own delay
        assert!(sent_at[0] - started >= config.page_delay());
        assert!(sent_at[1] - sent_at[0] >= config.article_delay());
        assert!(sent_at[3] - sent_at[2] >= config.article_delay());
        // the continue link is followed without another sleep
        assert!(sent_at[2] - sent_at[1] < config.article_delay());
    }

    #[tokio::test]
    async fn test_failed_listing_ends_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), 3);
        let source = FakeSource::default();

        let summary = fetch_pages(&source, &SaasNews, &base(), &config).await.unwrap();
        assert!(summary.written.is_empty());
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].unit, BASE);
        assert_eq!(source.requests.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_http_page_source_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news/seed-round"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<a href="/news/acme">Acme</a>"#),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/news/acme"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<h1>Acme Raises $5M</h1><div class=\"post-content\"><p>Seed.</p></div>",
            ))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = FetcherConfig {
            base_url: format!("{}/news/seed-round", server.uri()),
            ..test_config(dir.path(), 1)
        };
        let source = HttpPageSource::new(Duration::from_secs(5)).unwrap();
        let base = Url::parse(&config.base_url).unwrap();

        let summary = fetch_pages(&source, &SaasNews, &base, &config).await.unwrap();
        assert_eq!(summary.written.len(), 1);
        assert!(summary.skipped.is_empty());
        assert_eq!(
            std::fs::read_to_string(&summary.written[0]).unwrap(),
            "Acme Raises $5M\n\nSeed.\n\n"
        );

        let err = source
            .get(&format!("{}/nowhere", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, UnitError::Status { status: 404, .. }));
    }
}
