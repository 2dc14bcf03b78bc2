//! Ripple Engine main entry point
//!
//! Command-line interface for running a crawl job described by a TOML file.

use anyhow::Context;
use clap::Parser;
use ripple_engine::config::{load_config_with_hash, Config};
use ripple_engine::crawler::{proxy_from_urls, HtmlParser, HttpDownloader, Preparer};
use ripple_engine::engine::{Engine, Frontier, Options};
use ripple_engine::output::{load_statistics, print_statistics, SqliteOutput};
use ripple_engine::store::open_store;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Ripple Engine: a distributed web-crawl scheduler
///
/// Crawls outward from a set of seed URLs, admitting every discovered URL to
/// the job's frontier at most once. The frontier lives in a durable store, so
/// an interrupted job resumes where it stopped.
#[derive(Parser, Debug)]
#[command(name = "ripple-engine")]
#[command(version = "1.0.0")]
#[command(about = "A distributed web-crawl scheduler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Forget the job's frontier before crawling
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show frontier and results statistics and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config).await?;
    } else {
        handle_crawl(config, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripple_engine=info,warn"),
            1 => EnvFilter::new("ripple_engine=debug,info"),
            2 => EnvFilter::new("ripple_engine=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: prints the resolved configuration
fn handle_dry_run(config: &Config) {
    let options = Options::from(&config.request);

    println!("=== Ripple Engine Dry Run ===\n");

    println!("Job: {}", config.engine.name);

    println!("\nRequest Options:");
    println!("  Timeout: {:?}", options.req_timeout);
    println!("  Retry times: {}", options.retry_times);
    println!("  Retry delay: {:?}", options.retry_delay);
    println!("  Crawl interval: {:?}", options.req_interval);
    println!("  Dispatch interval: {:?}", options.dispatch_interval);
    println!("  Concurrent requests: {}", options.concurrent_req_num);
    println!("  Shutdown grace: {:?}", options.shutdown_grace);
    if let Some(user_agent) = &options.user_agent {
        println!("  User agent: {}", user_agent);
    }
    println!("  Headers: {}", options.headers.len());
    println!("  Cookies: {}", options.cookies.len());

    println!("\nStore:");
    println!("  Backend: {:?}", config.store.backend);
    if let Some(path) = &config.store.path {
        println!("  Path: {}", path);
    }
    if let Some(url) = &config.store.url {
        println!("  URL: {}", url);
    }

    println!("\nProxies ({}):", config.proxy.urls.len());
    for proxy in &config.proxy.urls {
        println!("  - {}", proxy);
    }

    if let Some(output) = &config.output {
        println!("\nOutput:");
        println!("  Database: {}", output.database_path);
    }

    println!("\nSeeds ({}):", config.engine.seeds.len());
    for seed in &config.engine.seeds {
        println!("  * {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: prints frontier and results statistics
async fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let store = open_store(&config.store)
        .await
        .context("Failed to open frontier store")?;
    let frontier = Frontier::new(store, &config.engine.name);

    let output = match &config.output {
        Some(output) => {
            let output = open_output(Path::new(&output.database_path))?;
            // Creates the results table if no crawl has run yet
            output.prepare_for_crawl().await?;
            Some(output)
        }
        None => None,
    };

    let stats = load_statistics(&config.engine.name, &frontier, output.as_deref()).await?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl mode
async fn handle_crawl(config: Config, fresh: bool) -> anyhow::Result<()> {
    let store = open_store(&config.store)
        .await
        .context("Failed to open frontier store")?;

    if fresh {
        tracing::info!("Starting fresh: clearing frontier of '{}'", config.engine.name);
        Frontier::new(Arc::clone(&store), &config.engine.name)
            .reset()
            .await
            .context("Failed to clear frontier")?;
    }

    let options = Options::from(&config.request);
    let downloader = HttpDownloader::new(options.clone(), proxy_from_urls(&config.proxy.urls))
        .context("Failed to build HTTP client")?;

    let mut builder = Engine::builder(config.engine.name.clone(), store)
        .seeds(config.engine.seeds.iter().cloned())
        .options(options)
        .downloader(Arc::new(downloader));

    if let Some(output) = &config.output {
        let output = open_output(Path::new(&output.database_path))?;
        builder = builder
            .parser(Arc::new(HtmlParser::with_output(Arc::clone(&output))))
            .preparer(output);
    }

    let engine = builder.build()?;
    let snapshot = engine.start().await?;

    println!(
        "Crawl stopped: {} crawled, {} failed",
        snapshot.crawled, snapshot.failed
    );

    Ok(())
}

fn open_output(path: &Path) -> anyhow::Result<Arc<SqliteOutput>> {
    let output = SqliteOutput::open(path)
        .with_context(|| format!("Failed to open results database {}", path.display()))?;
    Ok(Arc::new(output))
}
