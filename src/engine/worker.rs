//! Worker pool: drains the ready channel into spawned crawl tasks

use crate::engine::task::CrawlTask;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::task::TaskTracker;

/// Spawns at most `limit` tasks per batch
pub struct WorkerPool {
    ready: Mutex<mpsc::Receiver<String>>,
    limit: usize,
    task: Arc<CrawlTask>,
    tracker: TaskTracker,
}

impl WorkerPool {
    pub fn new(
        ready: mpsc::Receiver<String>,
        limit: usize,
        task: Arc<CrawlTask>,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            ready: Mutex::new(ready),
            limit,
            task,
            tracker,
        }
    }

    /// Drains up to `limit` URLs without waiting and spawns one task each
    ///
    /// An empty or closed channel skips the slot. Returns the number of
    /// tasks spawned.
    pub async fn spawn_batch(&self) -> usize {
        let mut ready = self.ready.lock().await;
        let mut spawned = 0;

        for _ in 0..self.limit {
            let Ok(url) = ready.try_recv() else {
                continue;
            };

            let task = Arc::clone(&self.task);
            self.tracker.spawn(async move {
                task.run(url).await;
            });
            spawned += 1;
        }

        if spawned > 0 {
            tracing::debug!("Spawned {} crawl tasks", spawned);
        }
        spawned
    }

    /// Closes the ready channel and returns whatever is still buffered
    pub async fn drain_remaining(&self) -> Vec<String> {
        let mut ready = self.ready.lock().await;
        ready.close();

        let mut remaining = Vec::new();
        while let Ok(url) = ready.try_recv() {
            remaining.push(url);
        }
        remaining
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }
}
