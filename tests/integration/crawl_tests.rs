//! Integration tests for the crawl engine
//!
//! These drive a full engine start-to-stop, either against a wiremock server
//! with the reference collaborators or against scripted collaborators over
//! an in-memory store.

use async_trait::async_trait;
use ripple_engine::crawler::{
    Downloader, HtmlParser, HttpDownloader, NoProxy, ParsedPage, Parser, Preparer,
};
use ripple_engine::engine::{Engine, EngineOption, Options, StatsSnapshot};
use ripple_engine::output::SqliteOutput;
use ripple_engine::store::{FrontierStore, MemoryStore, SqliteStore, StoreError, StoreResult};
use ripple_engine::{CrawlError, CrawlResult, EngineError};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_options() -> Vec<EngineOption> {
    vec![
        EngineOption::ReqInterval(Duration::from_millis(5)),
        EngineOption::DispatchInterval(Duration::from_millis(5)),
        EngineOption::ShutdownGrace(Duration::from_secs(5)),
    ]
}

fn test_builder(name: &str, store: Arc<dyn FrontierStore>) -> ripple_engine::EngineBuilder {
    fast_options()
        .into_iter()
        .fold(Engine::builder(name, store).handle_signals(false), |builder, option| {
            builder.option(option)
        })
}

/// Polls `condition` until it holds, panicking after ten seconds
async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "Condition not met within 10s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn spawn_engine(engine: &Arc<Engine>) -> JoinHandle<Result<StatsSnapshot, EngineError>> {
    let engine = Arc::clone(engine);
    tokio::spawn(async move { engine.start().await })
}

/// Serves scripted bodies; URLs without a script fail with a 404
struct ScriptedDownloader {
    pages: HashMap<String, String>,
    calls: AtomicUsize,
}

impl ScriptedDownloader {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Downloader for ScriptedDownloader {
    async fn download(&self, url: &str) -> CrawlResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(url)
            .map(|body| body.clone().into_bytes())
            .ok_or_else(|| CrawlError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// Treats every whitespace-separated token of the body as a link
struct TokenParser;

#[async_trait]
impl Parser for TokenParser {
    async fn parse(&self, url: &str, content: &[u8]) -> CrawlResult<ParsedPage> {
        Ok(ParsedPage {
            url: url.to_string(),
            title: None,
            links: String::from_utf8_lossy(content)
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        })
    }

    async fn save(&self, _page: &ParsedPage) -> CrawlResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_full_crawl_against_mock_server() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    let pages = [
        ("/", r#"<a href="/a">A</a> <a href="/b">B</a> <a href="/missing">X</a>"#.to_string()),
        ("/a", format!(r#"<title>A</title><a href="{}/b">B</a> <a href="/">Home</a>"#, base)),
        ("/b", "<title>B</title><p>leaf</p>".to_string()),
    ];
    for (route, body) in &pages {
        Mock::given(method("GET"))
            .and(path(*route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.clone()))
            .expect(1)
            .mount(&mock_server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::open(&temp_dir.path().join("frontier.db")).unwrap());
    let output = Arc::new(SqliteOutput::open(&temp_dir.path().join("results.db")).unwrap());

    let options = Options::with(
        fast_options()
            .into_iter()
            .chain([EngineOption::RetryTimes(0)]),
    );
    let downloader = HttpDownloader::new(options.clone(), Arc::new(NoProxy)).unwrap();

    let engine = Arc::new(
        Engine::builder("mock-site", store)
            .handle_signals(false)
            .options(options)
            .seeds([format!("{}/", base)])
            .downloader(Arc::new(downloader))
            .parser(Arc::new(HtmlParser::with_output(Arc::clone(&output))))
            .preparer(output.clone())
            .build()
            .unwrap(),
    );
    let handle = spawn_engine(&engine);

    wait_until(|| {
        let engine = Arc::clone(&engine);
        async move {
            let snapshot = engine.stats().snapshot();
            snapshot.completed() == 4
                && snapshot.crawling == 0
                && engine.frontier().pending().await.unwrap() == 0
        }
    })
    .await;
    engine.stop();
    let snapshot = handle.await.unwrap().unwrap();

    assert_eq!(snapshot.crawled, 3);
    assert_eq!(snapshot.failed, 1);
    assert_eq!(snapshot.crawling, 0);
    assert_eq!(engine.frontier().seen().await.unwrap(), 4);
    assert_eq!(output.count_pages().await.unwrap(), 3);
}

#[tokio::test]
async fn test_link_graph_counters_are_conserved() {
    let downloader = Arc::new(ScriptedDownloader::new(&[
        ("http://x.com/a", "http://x.com/b http://x.com/c http://x.com/a"),
        ("http://x.com/b", "http://x.com/c http://x.com/d"),
        ("http://x.com/c", "http://x.com/a"),
        ("http://x.com/d", "http://x.com/dead"),
    ]));
    let engine = Arc::new(
        test_builder("graph", Arc::new(MemoryStore::new()))
            .option(EngineOption::ConcurrentReqNum(2))
            .seeds(["http://x.com/a", " http://x.com/a\n"])
            .downloader(downloader.clone())
            .parser(Arc::new(TokenParser))
            .build()
            .unwrap(),
    );
    let handle = spawn_engine(&engine);

    wait_until(|| {
        let engine = Arc::clone(&engine);
        async move {
            let snapshot = engine.stats().snapshot();
            snapshot.completed() == 5 && snapshot.crawling == 0
        }
    })
    .await;
    engine.stop();
    let snapshot = handle.await.unwrap().unwrap();

    assert_eq!(snapshot.crawled, 4);
    assert_eq!(snapshot.failed, 1);
    assert_eq!(snapshot.crawling, 0);
    // Every distinct URL was fetched exactly once
    assert_eq!(downloader.calls.load(Ordering::SeqCst), 5);
    assert_eq!(engine.frontier().seen().await.unwrap(), 5);
}

#[tokio::test]
async fn test_failing_downloads_only_grow_failed_count() {
    let seeds: Vec<String> = (0..6).map(|i| format!("http://x.com/{}", i)).collect();
    let engine = Arc::new(
        test_builder("broken", Arc::new(MemoryStore::new()))
            .seeds(seeds)
            .downloader(Arc::new(ScriptedDownloader::new(&[])))
            .parser(Arc::new(TokenParser))
            .build()
            .unwrap(),
    );
    let handle = spawn_engine(&engine);

    wait_until(|| {
        let engine = Arc::clone(&engine);
        async move { engine.stats().failed_count() == 6 }
    })
    .await;
    engine.stop();
    let snapshot = handle.await.unwrap().unwrap();

    assert_eq!(snapshot.crawled, 0);
    assert_eq!(snapshot.failed, 6);
    assert_eq!(engine.frontier().pending().await.unwrap(), 0);
}

/// Downloader that never finishes before `release` is notified
struct GatedDownloader {
    release: tokio::sync::Notify,
}

#[async_trait]
impl Downloader for GatedDownloader {
    async fn download(&self, _url: &str) -> CrawlResult<Vec<u8>> {
        self.release.notified().await;
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_shutdown_returns_undispatched_urls_to_queue() {
    let seeds: Vec<String> = (0..10).map(|i| format!("http://x.com/{}", i)).collect();
    let downloader = Arc::new(GatedDownloader {
        release: tokio::sync::Notify::new(),
    });
    let engine = Arc::new(
        test_builder("requeue", Arc::new(MemoryStore::new()))
            .option(EngineOption::ConcurrentReqNum(3))
            .option(EngineOption::ShutdownGrace(Duration::from_millis(50)))
            .seeds(seeds)
            .downloader(downloader.clone())
            .parser(Arc::new(TokenParser))
            .build()
            .unwrap(),
    );
    let handle = spawn_engine(&engine);

    // Some tasks are stuck in flight and the ready channel holds the rest
    wait_until(|| {
        let engine = Arc::clone(&engine);
        async move {
            engine.stats().crawling_count() > 0 && engine.frontier().pending().await.unwrap() < 10
        }
    })
    .await;
    engine.stop();
    let snapshot = handle.await.unwrap().unwrap();

    // Stuck tasks were left detached; everything else went back to the queue
    let pending = engine.frontier().pending().await.unwrap() as i64;
    assert_eq!(snapshot.crawled + snapshot.failed, 0);
    assert_eq!(pending + snapshot.crawling, 10);
    downloader.release.notify_waiters();
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let engine = test_builder("once", Arc::new(MemoryStore::new()))
        .downloader(Arc::new(ScriptedDownloader::new(&[])))
        .build()
        .unwrap();
    engine.stop();
    engine.start().await.unwrap();

    let result = engine.start().await;
    assert!(matches!(result, Err(EngineError::AlreadyStarted(_))));
}

/// Preparer that fails the first `failures` calls
struct FlakyPreparer {
    failures: AtomicUsize,
}

#[async_trait]
impl Preparer for FlakyPreparer {
    async fn prepare_for_crawl(&self) -> CrawlResult<()> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(CrawlError::Other("schema unavailable".to_string()));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_prepare_failure_seeds_nothing() {
    let store = Arc::new(MemoryStore::new());
    let engine = test_builder("prep", store.clone())
        .seeds(["http://x.com/a"])
        .downloader(Arc::new(ScriptedDownloader::new(&[])))
        .preparer(Arc::new(FlakyPreparer {
            failures: AtomicUsize::new(1),
        }))
        .build()
        .unwrap();

    let result = engine.start().await;
    assert!(matches!(result, Err(EngineError::Prepare(_))));
    assert_eq!(engine.frontier().seen().await.unwrap(), 0);
    assert_eq!(engine.frontier().pending().await.unwrap(), 0);

    // A failed start can be retried
    engine.stop();
    engine.start().await.unwrap();
    assert_eq!(engine.frontier().seen().await.unwrap(), 1);
}

/// Store whose dedup set is unreachable
struct UnreachableStore;

#[async_trait]
impl FrontierStore for UnreachableStore {
    async fn set_add(&self, _key: &str, _member: &str) -> StoreResult<bool> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
    async fn list_append(&self, _key: &str, _values: &[String]) -> StoreResult<()> {
        Ok(())
    }
    async fn list_pop_front(&self, _key: &str) -> StoreResult<Option<String>> {
        Ok(None)
    }
    async fn list_len(&self, _key: &str) -> StoreResult<u64> {
        Ok(0)
    }
    async fn set_len(&self, _key: &str) -> StoreResult<u64> {
        Ok(0)
    }
    async fn delete(&self, _key: &str) -> StoreResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_seeding_store_failure_halts_start() {
    let engine = test_builder("down", Arc::new(UnreachableStore))
        .seeds(["http://x.com/a"])
        .downloader(Arc::new(ScriptedDownloader::new(&[])))
        .build()
        .unwrap();

    let result = engine.start().await;
    assert!(matches!(result, Err(EngineError::Store(_))));
    assert_eq!(engine.stats().snapshot(), StatsSnapshot::default());
}

#[tokio::test]
async fn test_jobs_share_frontier_by_name() {
    let store: Arc<dyn FrontierStore> = Arc::new(MemoryStore::new());
    let build = |name: &str| {
        test_builder(name, Arc::clone(&store))
            .downloader(Arc::new(ScriptedDownloader::new(&[])))
            .build()
            .unwrap()
    };
    let first = build("shared");
    let second = build("shared");
    let other = build("other");

    assert_eq!(first.frontier().enqueue(&["http://x.com/a"]).await.unwrap(), 1);
    assert_eq!(second.frontier().enqueue(&["http://x.com/a"]).await.unwrap(), 0);
    assert_eq!(other.frontier().enqueue(&["http://x.com/a"]).await.unwrap(), 1);

    assert_eq!(second.frontier().pop().await.unwrap().as_deref(), Some("http://x.com/a"));
    assert_eq!(first.frontier().pending().await.unwrap(), 0);
    assert_eq!(other.frontier().pending().await.unwrap(), 1);
}

#[tokio::test]
async fn test_stop_is_idempotent_while_running() {
    let engine = Arc::new(
        test_builder("stopper", Arc::new(MemoryStore::new()))
            .downloader(Arc::new(ScriptedDownloader::new(&[])))
            .build()
            .unwrap(),
    );
    let handle = spawn_engine(&engine);

    tokio::time::sleep(Duration::from_millis(20)).await;
    engine.stop();
    engine.stop();
    let snapshot = handle.await.unwrap().unwrap();

    assert_eq!(snapshot, StatsSnapshot::default());
    engine.stop();
}

/// Records the most downloads running at once
#[derive(Default)]
struct PeakDownloader {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    hold: Duration,
}

#[async_trait]
impl Downloader for PeakDownloader {
    async fn download(&self, _url: &str) -> CrawlResult<Vec<u8>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if self.hold.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.hold).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

async fn run_until_all_crawled(downloader: Arc<PeakDownloader>, seeds: usize) -> StatsSnapshot {
    let engine = Arc::new(
        test_builder("bounded", Arc::new(MemoryStore::new()))
            .option(EngineOption::ConcurrentReqNum(3))
            .option(EngineOption::ReqInterval(Duration::from_millis(100)))
            .seeds((0..seeds).map(|i| format!("http://x.com/{}", i)))
            .downloader(downloader)
            .parser(Arc::new(TokenParser))
            .build()
            .unwrap(),
    );
    let handle = spawn_engine(&engine);

    wait_until(|| {
        let engine = Arc::clone(&engine);
        async move { engine.stats().crawled_count() == seeds as i64 }
    })
    .await;
    engine.stop();
    handle.await.unwrap().unwrap()
}

#[tokio::test]
async fn test_concurrency_bounded_with_slow_downloads() {
    let downloader = Arc::new(PeakDownloader {
        hold: Duration::from_millis(5),
        ..Default::default()
    });

    let snapshot = run_until_all_crawled(downloader.clone(), 12).await;

    assert_eq!(snapshot.crawled, 12);
    assert!(downloader.peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn test_concurrency_bounded_with_instant_downloads() {
    let downloader = Arc::new(PeakDownloader::default());

    let snapshot = run_until_all_crawled(downloader.clone(), 30).await;

    assert_eq!(snapshot.crawled, 30);
    let peak = downloader.peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "peak in-flight downloads was {}", peak);
}
