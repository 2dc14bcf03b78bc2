use serde::Deserialize;
use std::collections::HashMap;

/// Main configuration structure for Ripple Engine
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub output: Option<OutputConfig>,
}

/// Crawl job identity and seeds
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Job name; namespaces the frontier keys in the store
    pub name: String,

    /// URLs admitted to the frontier when the engine starts
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// Request and scheduling behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Headers attached to every fetch
    pub headers: HashMap<String, String>,

    /// Cookies attached to every fetch
    pub cookies: HashMap<String, String>,

    /// Per-fetch deadline (milliseconds)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Extra fetch attempts after the first one fails (`retry-times + 1` in total)
    #[serde(rename = "retry-times")]
    pub retry_times: u32,

    /// Delay between fetch attempts (milliseconds, 0 = downloader default)
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Crawl tick period (milliseconds)
    #[serde(rename = "interval-ms")]
    pub interval_ms: u64,

    /// Dispatcher tick period (milliseconds)
    #[serde(rename = "dispatch-interval-ms")]
    pub dispatch_interval_ms: u64,

    /// Ready channel capacity and per-tick drain limit
    #[serde(rename = "concurrent-requests")]
    pub concurrent_requests: usize,

    /// How long shutdown waits for in-flight tasks (milliseconds)
    #[serde(rename = "shutdown-grace-ms")]
    pub shutdown_grace_ms: u64,

    /// Optional User-Agent header value
    #[serde(rename = "user-agent")]
    pub user_agent: Option<String>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            cookies: HashMap::new(),
            timeout_ms: 1_000,
            retry_times: 3,
            retry_delay_ms: 0,
            interval_ms: 100,
            dispatch_interval_ms: 500,
            concurrent_requests: 100,
            shutdown_grace_ms: 30_000,
            user_agent: None,
        }
    }
}

/// Which store backend holds the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
    Redis,
}

/// Frontier store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Database file for the sqlite backend
    pub path: Option<String>,

    /// Connection URL for the redis backend
    pub url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: Some("./ripple-frontier.db".to_string()),
            url: None,
        }
    }
}

/// Proxy configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyConfig {
    /// Proxy URLs; rotated round-robin when more than one is given
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database that receives crawled page records
    #[serde(rename = "database-path")]
    pub database_path: String,
}
