//! Per-URL crawl task
//!
//! Every URL drained from the ready channel runs the same pipeline:
//! download, parse, re-enqueue discovered links, persist. A failure at any
//! step ends the task as failed; re-enqueue failures are only logged.

use crate::crawler::{Downloader, Parser};
use crate::engine::frontier::Frontier;
use crate::engine::stats::{InFlight, Stats};
use crate::CrawlError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Pipeline stage of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Downloading,
    Parsing,
    Enqueuing,
    Persisting,
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

/// Terminal status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Succeeded,
    Timeout,
    NotFound,
    InternalServerErr,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Succeeded => "succeeded",
            Status::Timeout => "timeout",
            Status::NotFound => "not_found",
            Status::InternalServerErr => "internal_server_error",
            Status::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle record of one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: Option<Status>,
}

impl TaskStatus {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            created_at: Utc::now(),
            finished_at: None,
            status: None,
        }
    }

    /// Marks the task finished with `status`
    pub fn finish(&mut self, status: Status) {
        self.finished_at = Some(Utc::now());
        self.status = Some(status);
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_some()
    }
}

/// Receives every finalized [`TaskStatus`]
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn sync(&self, status: &TaskStatus);
}

/// Sink that emits a tracing event per finished task
#[derive(Debug, Clone, Copy, Default)]
pub struct LogStatusSink;

#[async_trait]
impl StatusSink for LogStatusSink {
    async fn sync(&self, status: &TaskStatus) {
        let elapsed_ms = status
            .finished_at
            .map(|finished| (finished - status.created_at).num_milliseconds())
            .unwrap_or_default();
        let outcome = status.status.map(|s| s.as_str()).unwrap_or("unfinished");

        tracing::debug!(
            url = %status.url,
            status = outcome,
            elapsed_ms,
            "Task finished"
        );
    }
}

/// Shared pipeline state for every task of one engine
pub struct CrawlTask {
    downloader: Arc<dyn Downloader>,
    parser: Arc<dyn Parser>,
    frontier: Frontier,
    stats: Arc<Stats>,
    sink: Arc<dyn StatusSink>,
}

impl CrawlTask {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        parser: Arc<dyn Parser>,
        frontier: Frontier,
        stats: Arc<Stats>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            downloader,
            parser,
            frontier,
            stats,
            sink,
        }
    }

    /// Runs the pipeline for `url` to completion
    ///
    /// `crawling_count` is held for the whole run and exactly one of
    /// `crawled_count` or `failed_count` is incremented.
    pub async fn run(&self, url: String) -> TaskStatus {
        let _in_flight = InFlight::enter(&self.stats);
        let mut status = TaskStatus::new(url);

        let outcome = match self.execute(&status.url).await {
            Ok(()) => {
                self.stats.incr_crawled_count(1);
                Status::Succeeded
            }
            Err((state, e)) => {
                tracing::warn!(url = %status.url, error = %e, "Task failed while {:?}", state);
                advance(state, TaskState::Failed);
                self.stats.incr_failed_count(1);
                e.status()
            }
        };

        status.finish(outcome);
        self.sink.sync(&status).await;
        status
    }

    async fn execute(&self, url: &str) -> Result<(), (TaskState, CrawlError)> {
        let mut state = TaskState::Pending;
        tracing::debug!("Crawling {}", url);

        state = advance(state, TaskState::Downloading);
        let content = self
            .downloader
            .download(url)
            .await
            .map_err(|e| (state, e))?;

        state = advance(state, TaskState::Parsing);
        let page = self
            .parser
            .parse(url, &content)
            .await
            .map_err(|e| (state, e))?;

        state = advance(state, TaskState::Enqueuing);
        if !page.links.is_empty() {
            match self.frontier.enqueue(&page.links).await {
                Ok(admitted) => {
                    tracing::debug!("{} links from {}, {} new", page.links.len(), url, admitted)
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Failed to enqueue discovered links")
                }
            }
        }

        state = advance(state, TaskState::Persisting);
        self.parser.save(&page).await.map_err(|e| (state, e))?;

        advance(state, TaskState::Succeeded);
        Ok(())
    }
}

fn advance(from: TaskState, to: TaskState) -> TaskState {
    tracing::trace!("Task state {:?} -> {:?}", from, to);
    to
}
