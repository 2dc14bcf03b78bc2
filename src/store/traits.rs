//! Store trait and error types
//!
//! This module defines the trait interface for frontier store backends and
//! associated error types.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for frontier store backends
///
/// Implementations must be safe for concurrent use by many tasks; the engine
/// shares one handle between the dispatcher and every in-flight crawl task.
/// `set_add` must be atomic per member so that two concurrent callers can never
/// both observe a first insert.
#[async_trait]
pub trait FrontierStore: Send + Sync {
    /// Adds `member` to the set at `key`
    ///
    /// Returns true iff the member was not present before this call.
    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Appends `values` to the tail of the list at `key` as one batch
    ///
    /// An empty slice is a no-op.
    async fn list_append(&self, key: &str, values: &[String]) -> StoreResult<()>;

    /// Removes and returns the head of the list at `key`
    async fn list_pop_front(&self, key: &str) -> StoreResult<Option<String>>;

    /// Number of items currently in the list at `key`
    async fn list_len(&self, key: &str) -> StoreResult<u64>;

    /// Number of members in the set at `key`
    async fn set_len(&self, key: &str) -> StoreResult<u64>;

    /// Removes the list or set stored at `key`
    async fn delete(&self, key: &str) -> StoreResult<()>;
}
