//! Output module for crawl results and statistics
//!
//! This module handles:
//! - Recording parsed pages to a SQLite results database
//! - Reporting frontier and result statistics

mod sqlite_output;
pub mod stats;

pub use sqlite_output::SqliteOutput;
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
