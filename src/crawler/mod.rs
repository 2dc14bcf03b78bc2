//! Crawl collaborators
//!
//! The engine schedules work but never fetches or parses anything itself.
//! It consumes four capabilities, one trait each:
//! - [`Downloader`]: fetch the body of a URL
//! - [`Parser`]: extract target URLs from a body and persist the result
//! - [`Preparer`]: one-time setup before the frontier is seeded
//! - [`Proxy`]: supplies the proxy URL used by the downloader
//!
//! Reference implementations live alongside the traits.

mod fetcher;
mod parser;
mod proxy;
mod traits;

pub use fetcher::{build_http_client, HttpDownloader, DEFAULT_RETRY_DELAY};
pub use parser::{parse_html, HtmlParser};
pub use proxy::{proxy_from_urls, NoProxy, RotatingProxy, StaticProxy};
pub use traits::{Downloader, NoopPreparer, ParsedPage, Parser, Preparer, Proxy};
