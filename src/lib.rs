//! Ripple Engine: a distributed web-crawl scheduling engine
//!
//! This crate manages a frontier of URLs for a named crawl job, guarantees that
//! each URL is admitted at most once per job, bounds how many fetches start per
//! tick, and drives every URL through a fixed fetch → extract → re-enqueue →
//! persist pipeline while keeping liveness counters.

pub mod config;
pub mod crawler;
pub mod engine;
pub mod output;
pub mod store;

use thiserror::Error;

/// Main error type for engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Crawl error: {0}")]
    Crawl(#[from] CrawlError),

    #[error("Preparation for crawl failed: {0}")]
    Prepare(CrawlError),

    #[error("Engine '{0}' has already been started")]
    AlreadyStarted(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors reported by the crawl collaborators (downloader, parser, persistence)
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Parse error for {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Failed to save {url}: {message}")]
    Save { url: String, message: String },

    #[error("Invalid proxy URL {proxy}: {source}")]
    Proxy { proxy: String, source: reqwest::Error },

    #[error("{0}")]
    Other(String),
}

impl CrawlError {
    /// Terminal task status this error maps to
    pub fn status(&self) -> engine::Status {
        match self {
            CrawlError::Timeout { .. } => engine::Status::Timeout,
            CrawlError::Http { source, .. } if source.is_timeout() => engine::Status::Timeout,
            CrawlError::Status { status: 404, .. } => engine::Status::NotFound,
            CrawlError::Status { status, .. } if (500..600).contains(status) => {
                engine::Status::InternalServerErr
            }
            _ => engine::Status::Failed,
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for collaborator operations
pub type CrawlResult<T> = std::result::Result<T, CrawlError>;

// Re-export commonly used types
pub use config::Config;
pub use engine::{Engine, EngineBuilder, EngineOption, Options, Stats, StatsSnapshot};
pub use store::{FrontierStore, MemoryStore, SqliteStore};
