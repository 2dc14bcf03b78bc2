//! Reference [`Parser`]: HTML link extraction via scraper
//!
//! Discovered links are resolved against the page URL and handed back to the
//! engine for admission; the title is kept for the results database.

use crate::crawler::traits::{ParsedPage, Parser};
use crate::output::SqliteOutput;
use crate::{CrawlError, CrawlResult};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::Arc;
use url::Url;

/// Parser for HTML pages
///
/// Results are written to a [`SqliteOutput`] when one is attached; otherwise
/// `save` only logs.
#[derive(Clone, Default)]
pub struct HtmlParser {
    output: Option<Arc<SqliteOutput>>,
}

impl HtmlParser {
    /// Creates a parser that does not persist results
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a parser that records every saved page in `output`
    pub fn with_output(output: Arc<SqliteOutput>) -> Self {
        Self {
            output: Some(output),
        }
    }
}

#[async_trait]
impl Parser for HtmlParser {
    async fn parse(&self, url: &str, content: &[u8]) -> CrawlResult<ParsedPage> {
        let base_url = Url::parse(url).map_err(|e| CrawlError::Parse {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let html = String::from_utf8_lossy(content);
        let mut page = parse_html(&html, &base_url);
        page.url = url.to_string();
        Ok(page)
    }

    async fn save(&self, page: &ParsedPage) -> CrawlResult<()> {
        match &self.output {
            Some(output) => output.record_page(page).await,
            None => {
                tracing::debug!("Parsed {} ({} links)", page.url, page.links.len());
                Ok(())
            }
        }
    }
}

/// Extracts the title and followable links of an HTML document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
/// - Anything that does not resolve to http(s)
///
/// # Example
///
/// ```
/// use ripple_engine::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        url: base_url.to_string(),
        title: extract_title(&document),
        links: extract_links(&document, base_url),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(absolute_url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            {
                links.push(absolute_url);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(absolute_url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            {
                links.push(absolute_url);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute http(s) URL
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url.to_string()),
        _ => None,
    }
}
