//! HTTP downloader implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with configured headers, cookies and timeout
//! - Routing requests through the proxy supplied by a [`Proxy`] accessor
//! - Retrying failed attempts with a fixed delay
//! - Classifying failures into timeout / status / transport errors

use crate::crawler::traits::{Downloader, Proxy};
use crate::engine::Options;
use crate::{CrawlError, CrawlResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Delay between attempts when retries are enabled and no delay is configured
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Builds an HTTP client with the configured request settings
///
/// # Arguments
///
/// * `options` - Engine options (headers, cookies, timeout, user agent)
/// * `proxy_url` - Proxy to route every request through, if any
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(CrawlError)` - Invalid header, cookie or proxy, or client build failure
pub fn build_http_client(options: &Options, proxy_url: Option<&str>) -> CrawlResult<Client> {
    let mut builder = Client::builder()
        .default_headers(default_headers(options)?)
        .timeout(options.req_timeout)
        .gzip(true)
        .brotli(true);

    if let Some(user_agent) = &options.user_agent {
        builder = builder.user_agent(user_agent.clone());
    }

    if let Some(proxy) = proxy_url {
        let proxy_config = reqwest::Proxy::all(proxy).map_err(|source| CrawlError::Proxy {
            proxy: proxy.to_string(),
            source,
        })?;
        builder = builder.proxy(proxy_config);
    }

    builder
        .build()
        .map_err(|e| CrawlError::Other(format!("Failed to build HTTP client: {}", e)))
}

/// Converts configured headers and cookies into a header map
fn default_headers(options: &Options) -> CrawlResult<HeaderMap> {
    let mut headers = HeaderMap::new();

    for (name, value) in &options.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| CrawlError::Other(format!("Invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| CrawlError::Other(format!("Invalid value for header {}: {}", name, e)))?;
        headers.insert(name, value);
    }

    if !options.cookies.is_empty() {
        // Sorted so the header is stable between runs
        let mut pairs: Vec<_> = options.cookies.iter().collect();
        pairs.sort();
        let cookie = pairs
            .into_iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| CrawlError::Other(format!("Invalid cookie header: {}", e)))?;
        headers.insert(COOKIE, value);
    }

    Ok(headers)
}

/// Downloader backed by reqwest
///
/// One client is built per distinct proxy URL and reused afterwards.
pub struct HttpDownloader {
    options: Options,
    proxy: Arc<dyn Proxy>,
    retry_delay: Duration,
    clients: Mutex<HashMap<Option<String>, Client>>,
}

impl HttpDownloader {
    /// Creates a downloader
    ///
    /// The direct (or first proxy) client is built eagerly so that bad headers
    /// or proxy URLs surface at construction time.
    pub fn new(options: Options, proxy: Arc<dyn Proxy>) -> CrawlResult<Self> {
        let retry_delay = if options.retry_times > 1 && options.retry_delay.is_zero() {
            DEFAULT_RETRY_DELAY
        } else {
            options.retry_delay
        };

        let downloader = Self {
            options,
            proxy,
            retry_delay,
            clients: Mutex::new(HashMap::new()),
        };
        downloader.client_for(downloader.proxy.proxy_url())?;
        Ok(downloader)
    }

    /// Delay applied between attempts
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    fn client_for(&self, proxy_url: Option<String>) -> CrawlResult<Client> {
        let mut clients = self
            .clients
            .lock()
            .map_err(|e| CrawlError::Other(format!("Failed to lock client cache: {}", e)))?;

        if let Some(client) = clients.get(&proxy_url) {
            return Ok(client.clone());
        }

        let client = build_http_client(&self.options, proxy_url.as_deref())?;
        clients.insert(proxy_url, client.clone());
        Ok(client)
    }

    /// Makes a single GET attempt
    async fn fetch_once(&self, url: &str) -> CrawlResult<Vec<u8>> {
        let client = self.client_for(self.proxy.proxy_url())?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| classify_error(url, e))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    /// Fetches `url`, retrying up to `retry_times` more times
    ///
    /// When every attempt fails the first error is returned.
    async fn download(&self, url: &str) -> CrawlResult<Vec<u8>> {
        let attempts = self.options.retry_times.saturating_add(1);
        let mut first_error: Option<CrawlError> = None;

        for attempt in 1..=attempts {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    tracing::debug!("Attempt {}/{} for {} failed: {}", attempt, attempts, url, e);
                    first_error.get_or_insert(e);
                }
            }

            if attempt < attempts && !self.retry_delay.is_zero() {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(first_error
            .unwrap_or_else(|| CrawlError::Other(format!("No download attempt made for {}", url))))
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> CrawlError {
    if error.is_timeout() {
        CrawlError::Timeout {
            url: url.to_string(),
        }
    } else {
        CrawlError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}
