//! Crawl frontier
//!
//! The frontier is a dedup set holding every URL ever admitted to a job plus a
//! FIFO queue of URLs not yet dispatched. Both live in the store; the
//! frontier itself only derives key names and applies admission rules.

use crate::store::{FrontierStore, StoreResult};
use std::sync::Arc;

/// Suffix of the durable queue key
pub const QUEUE_KEY_SUFFIX: &str = "seed_urls";

/// Suffix of the dedup set key
pub const SET_KEY_SUFFIX: &str = "urls:set";

/// Strips surrounding whitespace and control characters from a raw URL
///
/// # Example
///
/// ```
/// use ripple_engine::engine::trim_url;
///
/// assert_eq!(trim_url("  http://a\n"), "http://a");
/// assert_eq!(trim_url("\thttp://a \r\n"), "http://a");
/// ```
pub fn trim_url(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || c.is_control())
}

/// Frontier of one named crawl job
///
/// Two frontiers built with the same job name over the same store share
/// state; different names never interfere.
#[derive(Clone)]
pub struct Frontier {
    store: Arc<dyn FrontierStore>,
    queue_key: String,
    set_key: String,
}

impl Frontier {
    pub fn new(store: Arc<dyn FrontierStore>, job_name: &str) -> Self {
        Self {
            store,
            queue_key: format!("{}:{}", job_name, QUEUE_KEY_SUFFIX),
            set_key: format!("{}:{}", job_name, SET_KEY_SUFFIX),
        }
    }

    pub fn queue_key(&self) -> &str {
        &self.queue_key
    }

    pub fn set_key(&self) -> &str {
        &self.set_key
    }

    /// Admits URLs to the frontier
    ///
    /// Each URL is trimmed, then added to the dedup set. Only URLs the set
    /// reports as newly inserted are appended to the queue, in input order,
    /// as one batch. Empty strings are ignored.
    ///
    /// A store error stops admission at the failing URL. URLs admitted before
    /// it are still queued, then the error is returned.
    ///
    /// # Returns
    ///
    /// The number of URLs appended to the queue
    pub async fn enqueue<S: AsRef<str>>(&self, urls: &[S]) -> StoreResult<usize> {
        let mut admitted = Vec::new();

        for raw in urls {
            let url = trim_url(raw.as_ref());
            if url.is_empty() {
                continue;
            }

            match self.store.set_add(&self.set_key, url).await {
                Ok(true) => admitted.push(url.to_string()),
                Ok(false) => {}
                Err(e) => {
                    self.flush_partial(&admitted).await;
                    return Err(e);
                }
            }
        }

        if admitted.is_empty() {
            return Ok(0);
        }

        self.store.list_append(&self.queue_key, &admitted).await?;
        tracing::trace!("Admitted {} URLs to {}", admitted.len(), self.queue_key);
        Ok(admitted.len())
    }

    /// Queues the URLs admitted before a failed set insert
    ///
    /// A set member that never reaches the queue is never crawled.
    async fn flush_partial(&self, admitted: &[String]) {
        if let Err(e) = self.store.list_append(&self.queue_key, admitted).await {
            tracing::error!(
                "Failed to queue {} partially admitted URLs for {}: {}",
                admitted.len(),
                self.queue_key,
                e
            );
        }
    }

    /// Pops the oldest pending URL
    pub async fn pop(&self) -> StoreResult<Option<String>> {
        self.store.list_pop_front(&self.queue_key).await
    }

    /// Puts already-admitted URLs back at the tail of the queue
    ///
    /// Used at shutdown for URLs that were dispatched but never crawled. The
    /// dedup set is not consulted since these URLs are members already.
    pub async fn requeue(&self, urls: &[String]) -> StoreResult<()> {
        self.store.list_append(&self.queue_key, urls).await
    }

    /// Number of URLs waiting in the queue
    pub async fn pending(&self) -> StoreResult<u64> {
        self.store.list_len(&self.queue_key).await
    }

    /// Number of URLs ever admitted
    pub async fn seen(&self) -> StoreResult<u64> {
        self.store.set_len(&self.set_key).await
    }

    /// Forgets every URL of this job
    pub async fn reset(&self) -> StoreResult<()> {
        self.store.delete(&self.queue_key).await?;
        self.store.delete(&self.set_key).await
    }
}
