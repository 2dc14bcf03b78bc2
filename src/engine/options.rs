//! Engine options
//!
//! Options are fixed once the engine is built. They are assembled from
//! defaults plus a list of [`EngineOption`] values, or from the `[request]`
//! configuration section.

use crate::config::RequestConfig;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_REQ_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_RETRY_TIMES: u32 = 3;
pub const DEFAULT_REQ_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_DISPATCH_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_CONCURRENT_REQ_NUM: usize = 100;
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Shortest tick period either loop accepts
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Request and scheduling options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Headers attached to every fetch
    pub headers: HashMap<String, String>,

    /// Cookies attached to every fetch
    pub cookies: HashMap<String, String>,

    /// Per-fetch deadline, handed to the downloader
    pub req_timeout: Duration,

    /// Extra fetch attempts after the first one fails (`retry_times + 1` in total)
    pub retry_times: u32,

    /// Delay between fetch attempts; zero lets the downloader pick
    pub retry_delay: Duration,

    /// Crawl tick period
    pub req_interval: Duration,

    /// Dispatcher tick period
    pub dispatch_interval: Duration,

    /// Ready channel capacity and per-tick drain limit
    pub concurrent_req_num: usize,

    /// How long shutdown waits for in-flight tasks
    pub shutdown_grace: Duration,

    /// User-Agent header value
    pub user_agent: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            cookies: HashMap::new(),
            req_timeout: DEFAULT_REQ_TIMEOUT,
            retry_times: DEFAULT_RETRY_TIMES,
            retry_delay: Duration::ZERO,
            req_interval: DEFAULT_REQ_INTERVAL,
            dispatch_interval: DEFAULT_DISPATCH_INTERVAL,
            concurrent_req_num: DEFAULT_CONCURRENT_REQ_NUM,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            user_agent: None,
        }
    }
}

/// A single option override
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOption {
    Headers(HashMap<String, String>),
    Cookies(HashMap<String, String>),
    ReqTimeout(Duration),
    RetryTimes(u32),
    RetryDelay(Duration),
    ReqInterval(Duration),
    DispatchInterval(Duration),
    ConcurrentReqNum(usize),
    ShutdownGrace(Duration),
    UserAgent(String),
}

impl Options {
    /// Defaults with `options` applied in order
    pub fn with(options: impl IntoIterator<Item = EngineOption>) -> Self {
        let mut resolved = Self::default();
        for option in options {
            resolved.apply(option);
        }
        resolved
    }

    /// Applies one override
    ///
    /// Zero concurrency and zero-length intervals are clamped to the smallest
    /// usable value.
    pub fn apply(&mut self, option: EngineOption) {
        match option {
            EngineOption::Headers(headers) => self.headers = headers,
            EngineOption::Cookies(cookies) => self.cookies = cookies,
            EngineOption::ReqTimeout(timeout) => self.req_timeout = timeout,
            EngineOption::RetryTimes(n) => self.retry_times = n,
            EngineOption::RetryDelay(delay) => self.retry_delay = delay,
            EngineOption::ReqInterval(interval) => self.req_interval = interval,
            EngineOption::DispatchInterval(interval) => self.dispatch_interval = interval,
            EngineOption::ConcurrentReqNum(n) => self.concurrent_req_num = n,
            EngineOption::ShutdownGrace(grace) => self.shutdown_grace = grace,
            EngineOption::UserAgent(user_agent) => self.user_agent = Some(user_agent),
        }
        self.clamp();
    }

    /// Returns these options with unusable zero values raised to the minimum
    pub(crate) fn normalized(mut self) -> Self {
        self.clamp();
        self
    }

    fn clamp(&mut self) {
        self.req_interval = self.req_interval.max(MIN_INTERVAL);
        self.dispatch_interval = self.dispatch_interval.max(MIN_INTERVAL);
        self.concurrent_req_num = self.concurrent_req_num.max(1);
    }
}

impl From<&RequestConfig> for Options {
    fn from(config: &RequestConfig) -> Self {
        let mut options = Self::with([
            EngineOption::Headers(config.headers.clone()),
            EngineOption::Cookies(config.cookies.clone()),
            EngineOption::ReqTimeout(Duration::from_millis(config.timeout_ms)),
            EngineOption::RetryTimes(config.retry_times),
            EngineOption::RetryDelay(Duration::from_millis(config.retry_delay_ms)),
            EngineOption::ReqInterval(Duration::from_millis(config.interval_ms)),
            EngineOption::DispatchInterval(Duration::from_millis(config.dispatch_interval_ms)),
            EngineOption::ConcurrentReqNum(config.concurrent_requests),
            EngineOption::ShutdownGrace(Duration::from_millis(config.shutdown_grace_ms)),
        ]);
        if let Some(user_agent) = &config.user_agent {
            options.apply(EngineOption::UserAgent(user_agent.clone()));
        }
        options
    }
}
