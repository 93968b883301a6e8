//! Site-specific HTML extraction strategies.
//!
//! The fetcher handles pagination, rate limiting, denylisting and file
//! output. Everything that depends on a site's markup lives behind the
//! [`SiteStrategy`] trait, one module per site, selected by host with
//! [`strategy_for`].
//!
//! # Supported Sources
//!
//! | Source | Module | Hosts |
//! |--------|--------|-------|
//! | The SaaS News | [`saasnews`] | `thesaasnews.com`, `www.thesaasnews.com` |
//!
//! Adding a source means adding a module that implements [`SiteStrategy`]
//! and an entry in [`STRATEGIES`].

use scraper::{ElementRef, Html};
use std::fmt;
use url::Url;

pub mod saasnews;

/// How to read listing and article pages of one site.
///
/// All methods are pure functions of parsed HTML so they can be tested
/// without network access.
pub trait SiteStrategy: fmt::Debug + Send + Sync {
    /// Human-readable source name used in logs.
    fn name(&self) -> &'static str;

    /// Candidate article URLs on a listing page, resolved against `base`,
    /// in document order. Duplicates and denylisted URLs are the caller's concern.
    fn article_links(&self, listing: &Html, base: &Url) -> Vec<String>;

    /// Article title from the landing page.
    fn title(&self, page: &Html) -> Option<String>;

    /// Link to the full article when the landing page only shows a preview.
    fn continue_link(&self, page: &Html, page_url: &Url) -> Option<Url>;

    /// Author/date line of the full article page.
    fn byline(&self, page: &Html) -> Option<String>;

    /// Body text of the full article page; empty when no container is found.
    fn body(&self, page: &Html) -> String;
}

static SAAS_NEWS: saasnews::SaasNews = saasnews::SaasNews;

/// Registered strategies keyed by host suffix.
pub static STRATEGIES: &[(&str, &dyn SiteStrategy)] = &[("thesaasnews.com", &SAAS_NEWS)];

/// Select the strategy responsible for `url`'s host.
pub fn strategy_for(url: &Url) -> Option<&'static dyn SiteStrategy> {
    let host = url.host_str()?;
    STRATEGIES
        .iter()
        .find(|(suffix, _)| host == *suffix || host.ends_with(&format!(".{suffix}")))
        .map(|(_, strategy)| *strategy)
}

/// All text below `element`, concatenated and trimmed.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// The only string inside `element`, following single-child chains.
///
/// Returns `None` when any level has more than one child node.
pub(crate) fn sole_string(element: ElementRef<'_>) -> Option<String> {
    let mut children = element.children();
    let only = children.next()?;
    if children.next().is_some() {
        return None;
    }
    if let Some(text) = only.value().as_text() {
        return Some(String::from(&**text));
    }
    ElementRef::wrap(only).and_then(sole_string)
}
