//! The SaaS News scraper.
//!
//! Listing pages (`/news/seed-round`, `?page=N`) link to articles under
//! `/news/...`. Some article pages show a preview with a "Continue reading"
//! link to the full text. The full page holds the body in an `<article>`
//! element, or in `div.post-content` on older templates.

use super::{SiteStrategy, element_text, sole_string};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static DIV: Lazy<Selector> = Lazy::new(|| Selector::parse("div").unwrap());
static ARTICLE: Lazy<Selector> = Lazy::new(|| Selector::parse("article").unwrap());
static POST_CONTENT: Lazy<Selector> = Lazy::new(|| Selector::parse("div.post-content").unwrap());
static BLOCKS: Lazy<Selector> = Lazy::new(|| Selector::parse("p, h2, h3, ul, ol").unwrap());
static LIST_ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse("li").unwrap());

const CONTINUE_READING: &str = "Continue reading";

#[derive(Debug, Default, Clone, Copy)]
pub struct SaasNews;

impl SiteStrategy for SaasNews {
    fn name(&self) -> &'static str {
        "The SaaS News"
    }

    fn article_links(&self, listing: &Html, base: &Url) -> Vec<String> {
        listing
            .select(&LINK)
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| href.contains("news"))
            .filter_map(|href| base.join(href).ok())
            .map(String::from)
            .collect()
    }

    fn title(&self, page: &Html) -> Option<String> {
        page.select(&H1).next().map(element_text)
    }

    fn continue_link(&self, page: &Html, page_url: &Url) -> Option<Url> {
        page.select(&LINK)
            .find(|a| element_text(*a) == CONTINUE_READING)
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| page_url.join(href).ok())
    }

    fn byline(&self, page: &Html) -> Option<String> {
        page.select(&DIV)
            .filter_map(sole_string)
            .find(|text| text.to_lowercase().contains("by"))
            .map(|text| text.trim().to_string())
    }

    fn body(&self, page: &Html) -> String {
        let Some(container) = page
            .select(&ARTICLE)
            .next()
            .or_else(|| page.select(&POST_CONTENT).next())
        else {
            return String::new();
        };

        let mut body = String::new();
        for block in container.select(&BLOCKS) {
            let text = element_text(block);
            if text.is_empty() {
                continue;
            }
            match block.value().name() {
                "ul" | "ol" => {
                    for item in block.select(&LIST_ITEM) {
                        body.push_str("• ");
                        body.push_str(&element_text(item));
                        body.push('\n');
                    }
                    body.push('\n');
                }
                _ => {
                    body.push_str(&text);
                    body.push_str("\n\n");
                }
            }
        }
        body
    }
}
