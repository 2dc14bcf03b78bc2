//! Proxy accessors for the HTTP downloader

use crate::crawler::traits::Proxy;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Direct connections, no proxy
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProxy;

impl Proxy for NoProxy {
    fn proxy_url(&self) -> Option<String> {
        None
    }
}

/// Always the same proxy
#[derive(Debug, Clone)]
pub struct StaticProxy {
    url: String,
}

impl StaticProxy {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Proxy for StaticProxy {
    fn proxy_url(&self) -> Option<String> {
        Some(self.url.clone())
    }
}

/// Round-robin over a fixed list of proxies
#[derive(Debug)]
pub struct RotatingProxy {
    urls: Vec<String>,
    cursor: AtomicUsize,
}

impl RotatingProxy {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Proxy for RotatingProxy {
    fn proxy_url(&self) -> Option<String> {
        if self.urls.is_empty() {
            return None;
        }
        let next = self.cursor.fetch_add(1, Ordering::Relaxed);
        Some(self.urls[next % self.urls.len()].clone())
    }
}

/// Picks the proxy accessor matching a configured URL list
///
/// No URLs means direct connections, one URL a static proxy, more than one
/// a rotation.
pub fn proxy_from_urls(urls: &[String]) -> Arc<dyn Proxy> {
    match urls {
        [] => Arc::new(NoProxy),
        [single] => Arc::new(StaticProxy::new(single.clone())),
        many => Arc::new(RotatingProxy::new(many.to_vec())),
    }
}
