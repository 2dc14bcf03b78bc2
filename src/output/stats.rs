//! Statistics reporting for a crawl job
//!
//! Combines what the frontier store knows (pending and seen URLs) with the
//! results database, if one is configured.

use crate::engine::Frontier;
use crate::output::SqliteOutput;
use crate::EngineError;

/// Crawl statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Crawl job name
    pub job: String,

    /// URLs waiting in the durable queue
    pub pending_urls: u64,

    /// URLs ever admitted to the job
    pub seen_urls: u64,

    /// Pages recorded in the results database, when one is configured
    pub saved_pages: Option<u64>,
}

/// Loads statistics for the job behind `frontier`
pub async fn load_statistics(
    job: &str,
    frontier: &Frontier,
    output: Option<&SqliteOutput>,
) -> Result<CrawlStatistics, EngineError> {
    let pending_urls = frontier.pending().await?;
    let seen_urls = frontier.seen().await?;

    let saved_pages = match output {
        Some(output) => Some(output.count_pages().await?),
        None => None,
    };

    Ok(CrawlStatistics {
        job: job.to_string(),
        pending_urls,
        seen_urls,
        saved_pages,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics: {} ===\n", stats.job);

    println!("Frontier:");
    println!("  URLs seen: {}", stats.seen_urls);
    println!("  URLs pending: {}", stats.pending_urls);

    let dispatched = stats.seen_urls.saturating_sub(stats.pending_urls);
    let percentage = if stats.seen_urls > 0 {
        (dispatched as f64 / stats.seen_urls as f64) * 100.0
    } else {
        0.0
    };
    println!("  URLs dispatched: {} ({:.1}%)", dispatched, percentage);

    if let Some(saved) = stats.saved_pages {
        println!();
        println!("Results:");
        println!("  Pages saved: {}", saved);
    }
}
