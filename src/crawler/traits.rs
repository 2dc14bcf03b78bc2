//! Collaborator traits consumed by the engine

use crate::CrawlResult;
use async_trait::async_trait;

/// Result of parsing one downloaded page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    /// The URL the content was downloaded from
    pub url: String,

    /// The page title, if one was found
    pub title: Option<String>,

    /// Newly discovered target URLs, in document order
    pub links: Vec<String>,
}

/// Fetches raw content for a URL
///
/// Retry policy, if any, belongs to the implementation. The engine treats a
/// download as an opaque, possibly slow, possibly failing call.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str) -> CrawlResult<Vec<u8>>;
}

/// Extracts target URLs from downloaded content and persists results
#[async_trait]
pub trait Parser: Send + Sync {
    /// Parses `content` downloaded from `url`
    async fn parse(&self, url: &str, content: &[u8]) -> CrawlResult<ParsedPage>;

    /// Persists a parsed page
    async fn save(&self, page: &ParsedPage) -> CrawlResult<()>;
}

/// One-time hook run before the frontier is seeded
#[async_trait]
pub trait Preparer: Send + Sync {
    async fn prepare_for_crawl(&self) -> CrawlResult<()>;
}

/// Supplies the proxy URL for the next request
pub trait Proxy: Send + Sync {
    /// Returns `None` to connect directly
    fn proxy_url(&self) -> Option<String>;
}

/// Preparer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPreparer;

#[async_trait]
impl Preparer for NoopPreparer {
    async fn prepare_for_crawl(&self) -> CrawlResult<()> {
        Ok(())
    }
}
