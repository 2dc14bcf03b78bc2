//! Crawl engine
//!
//! The [`Engine`] owns the counters, the ready channel and the shutdown
//! token of one named crawl job. Two loops run while it is started:
//!
//! - the dispatcher, which moves URLs from the durable queue into the
//!   bounded ready channel on its own tick
//! - the crawl tick loop, which drains the ready channel into spawned
//!   per-URL tasks
//!
//! Both stop when the shutdown token is cancelled, either by [`Engine::stop`]
//! or by SIGINT/SIGTERM.

pub mod dispatcher;
pub mod frontier;
pub mod options;
pub mod stats;
pub mod task;
pub mod worker;

pub use dispatcher::{Dispatcher, TickOutcome};
pub use frontier::{trim_url, Frontier};
pub use options::{EngineOption, Options};
pub use stats::{Stats, StatsSnapshot};
pub use task::{CrawlTask, LogStatusSink, Status, StatusSink, TaskState, TaskStatus};
pub use worker::WorkerPool;

use crate::crawler::{
    Downloader, HtmlParser, HttpDownloader, NoProxy, NoopPreparer, Parser, Preparer, Proxy,
};
use crate::store::FrontierStore;
use crate::{ConfigError, EngineError, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Ticks between progress log lines
const PROGRESS_EVERY_TICKS: u64 = 100;

type ReadyChannel = (mpsc::Sender<String>, mpsc::Receiver<String>);

/// Builder for [`Engine`]
///
/// Anything not supplied falls back to the reference collaborators:
/// [`HttpDownloader`], [`HtmlParser`], [`NoopPreparer`], [`NoProxy`] and
/// [`LogStatusSink`].
pub struct EngineBuilder {
    name: String,
    store: Arc<dyn FrontierStore>,
    seeds: Vec<String>,
    options: Options,
    proxy: Arc<dyn Proxy>,
    downloader: Option<Arc<dyn Downloader>>,
    parser: Option<Arc<dyn Parser>>,
    preparer: Arc<dyn Preparer>,
    sink: Arc<dyn StatusSink>,
    handle_signals: bool,
}

impl EngineBuilder {
    fn new(name: impl Into<String>, store: Arc<dyn FrontierStore>) -> Self {
        Self {
            name: name.into(),
            store,
            seeds: Vec::new(),
            options: Options::default(),
            proxy: Arc::new(NoProxy),
            downloader: None,
            parser: None,
            preparer: Arc::new(NoopPreparer),
            sink: Arc::new(LogStatusSink),
            handle_signals: true,
        }
    }

    /// URLs admitted to the frontier when the engine starts
    pub fn seeds<I, S>(mut self, seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seeds.extend(seeds.into_iter().map(Into::into));
        self
    }

    /// Applies one option override
    pub fn option(mut self, option: EngineOption) -> Self {
        self.options.apply(option);
        self
    }

    /// Replaces the options wholesale
    ///
    /// Zero intervals and zero concurrency are raised to their minimum at
    /// [`EngineBuilder::build`].
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Proxy used by the default downloader
    pub fn proxy(mut self, proxy: Arc<dyn Proxy>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn parser(mut self, parser: Arc<dyn Parser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn preparer(mut self, preparer: Arc<dyn Preparer>) -> Self {
        self.preparer = preparer;
        self
    }

    pub fn status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Whether SIGINT/SIGTERM stop the engine (default: true)
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    pub fn build(self) -> Result<Engine> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation("Engine name must not be empty".to_string()).into());
        }
        let options = self.options.normalized();

        let downloader: Arc<dyn Downloader> = match self.downloader {
            Some(downloader) => downloader,
            None => Arc::new(HttpDownloader::new(options.clone(), self.proxy)?),
        };
        let parser: Arc<dyn Parser> = match self.parser {
            Some(parser) => parser,
            None => Arc::new(HtmlParser::new()),
        };
        let ready = mpsc::channel(options.concurrent_req_num);

        Ok(Engine {
            frontier: Frontier::new(self.store, &self.name),
            name: self.name,
            seeds: self.seeds,
            options,
            stats: Arc::new(Stats::new()),
            downloader,
            parser,
            preparer: self.preparer,
            sink: self.sink,
            shutdown: CancellationToken::new(),
            ready: Mutex::new(Some(ready)),
            handle_signals: self.handle_signals,
        })
    }
}

/// A named crawl job
pub struct Engine {
    name: String,
    seeds: Vec<String>,
    options: Options,
    frontier: Frontier,
    stats: Arc<Stats>,
    downloader: Arc<dyn Downloader>,
    parser: Arc<dyn Parser>,
    preparer: Arc<dyn Preparer>,
    sink: Arc<dyn StatusSink>,
    shutdown: CancellationToken,
    ready: Mutex<Option<ReadyChannel>>,
    handle_signals: bool,
}

impl Engine {
    pub fn builder(name: impl Into<String>, store: Arc<dyn FrontierStore>) -> EngineBuilder {
        EngineBuilder::new(name, store)
    }

    /// Runs the crawl until shutdown
    ///
    /// Runs the preparation hook, seeds the frontier, then drives the
    /// dispatcher and the crawl tick loop until [`Engine::stop`] is called or
    /// a termination signal arrives. A failed preparation or seeding returns
    /// the error before anything is crawled, and `start` may then be retried.
    ///
    /// On shutdown, URLs still waiting in the ready channel are put back on
    /// the durable queue and in-flight tasks get `shutdown_grace` to finish.
    ///
    /// # Returns
    ///
    /// The counters as they stood when `start` returned, or
    /// [`EngineError::AlreadyStarted`] if the engine has run before.
    pub async fn start(&self) -> Result<StatsSnapshot> {
        let (ready_tx, ready_rx) = {
            let mut slot = self.ready.lock().await;
            if slot.is_none() {
                return Err(EngineError::AlreadyStarted(self.name.clone()));
            }

            tracing::info!("Starting crawl job '{}'", self.name);

            if let Err(e) = self.preparer.prepare_for_crawl().await {
                tracing::error!("Preparation for '{}' failed: {}", self.name, e);
                return Err(EngineError::Prepare(e));
            }

            match self.frontier.enqueue(&self.seeds).await {
                Ok(admitted) => tracing::info!(
                    "Seeded '{}' with {} new URLs ({} given)",
                    self.name,
                    admitted,
                    self.seeds.len()
                ),
                Err(e) => {
                    tracing::error!("Failed to seed '{}': {}", self.name, e);
                    return Err(e.into());
                }
            }

            match slot.take() {
                Some(channel) => channel,
                None => return Err(EngineError::AlreadyStarted(self.name.clone())),
            }
        };

        let dispatcher = Dispatcher::new(
            self.frontier.clone(),
            ready_tx,
            self.options.concurrent_req_num,
            self.options.dispatch_interval,
        );
        let dispatcher_handle = tokio::spawn(dispatcher.run(self.shutdown.clone()));

        let task = CrawlTask::new(
            Arc::clone(&self.downloader),
            Arc::clone(&self.parser),
            self.frontier.clone(),
            Arc::clone(&self.stats),
            Arc::clone(&self.sink),
        );
        let pool = WorkerPool::new(
            ready_rx,
            self.options.concurrent_req_num,
            Arc::new(task),
            TaskTracker::new(),
        );

        self.run_ticks(&pool).await;

        self.shutdown.cancel();
        if let Err(e) = dispatcher_handle.await {
            tracing::error!("Dispatcher task failed: {}", e);
        }

        let remaining = pool.drain_remaining().await;
        if !remaining.is_empty() {
            match self.frontier.requeue(&remaining).await {
                Ok(()) => {
                    tracing::info!("Returned {} undispatched URLs to the queue", remaining.len())
                }
                Err(e) => tracing::error!(
                    "Failed to return {} undispatched URLs to the queue: {}",
                    remaining.len(),
                    e
                ),
            }
        }

        let tracker = pool.tracker();
        tracker.close();
        if !tracker.is_empty() {
            tracing::info!("Waiting for {} in-flight tasks", tracker.len());
        }
        if tokio::time::timeout(self.options.shutdown_grace, tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                "{} tasks still running after {:?}, leaving them detached",
                tracker.len(),
                self.options.shutdown_grace
            );
        }

        let snapshot = self.stats.snapshot();
        tracing::info!(
            "Crawl job '{}' stopped: {} crawled, {} failed, {} in flight",
            self.name,
            snapshot.crawled,
            snapshot.failed,
            snapshot.crawling
        );
        Ok(snapshot)
    }

    async fn run_ticks(&self, pool: &WorkerPool) {
        let mut ticker = tokio::time::interval(self.options.req_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let signal = shutdown_signal(self.handle_signals);
        tokio::pin!(signal);

        let mut ticks: u64 = 0;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Stop requested for '{}'", self.name);
                    break;
                }
                _ = &mut signal => {
                    self.shutdown.cancel();
                    break;
                }
                _ = ticker.tick() => {
                    pool.spawn_batch().await;

                    ticks += 1;
                    if ticks % PROGRESS_EVERY_TICKS == 0 {
                        let snapshot = self.stats.snapshot();
                        tracing::info!(
                            "Progress: {} crawled, {} failed, {} in flight",
                            snapshot.crawled,
                            snapshot.failed,
                            snapshot.crawling
                        );
                    }
                }
            }
        }
    }

    /// Requests shutdown
    ///
    /// Safe to call any number of times, before or during [`Engine::start`].
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Token cancelled when the engine shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

/// Resolves on SIGINT or SIGTERM, or never when `enabled` is false
async fn shutdown_signal(enabled: bool) {
    if !enabled {
        return std::future::pending().await;
    }

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
