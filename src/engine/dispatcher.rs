//! Dispatcher: moves URLs from the durable queue into the ready channel
//!
//! Runs on its own tick, independent of the crawl tick. Each tick pops up to
//! `batch` URLs, one at a time. A slot in the ready channel is reserved before
//! every pop, so a popped URL always has somewhere to go: when the channel is
//! full the tick ends without touching the queue.

use crate::engine::frontier::Frontier;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// How a dispatch tick ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The whole pop budget was used
    Completed { sent: usize },

    /// The ready channel filled up; remaining URLs stay queued
    ChannelFull { sent: usize },

    /// The store failed; the rest of the tick was skipped
    StoreFailed { sent: usize },

    /// Every receiver is gone
    ChannelClosed,
}

/// Ready-channel filler
pub struct Dispatcher {
    frontier: Frontier,
    ready: mpsc::Sender<String>,
    batch: usize,
    interval: Duration,
}

impl Dispatcher {
    pub fn new(
        frontier: Frontier,
        ready: mpsc::Sender<String>,
        batch: usize,
        interval: Duration,
    ) -> Self {
        Self {
            frontier,
            ready,
            batch,
            interval,
        }
    }

    /// Ticks until `shutdown` is cancelled or the ready channel closes
    ///
    /// Consumes the dispatcher; its sender is dropped on return.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if self.dispatch_tick().await == TickOutcome::ChannelClosed {
                        tracing::warn!("Ready channel closed, dispatcher exiting");
                        break;
                    }
                }
            }
        }

        tracing::debug!("Dispatcher for {} stopped", self.frontier.queue_key());
    }

    /// Runs one dispatch tick
    pub async fn dispatch_tick(&self) -> TickOutcome {
        let mut sent = 0;

        for _ in 0..self.batch {
            let permit = match self.ready.try_reserve() {
                Ok(permit) => permit,
                Err(TrySendError::Full(())) => return TickOutcome::ChannelFull { sent },
                Err(TrySendError::Closed(())) => return TickOutcome::ChannelClosed,
            };

            match self.frontier.pop().await {
                Ok(Some(url)) if !url.is_empty() => {
                    permit.send(url);
                    sent += 1;
                }
                // Queue momentarily drained; the permit is released on drop
                Ok(_) => continue,
                Err(e) => {
                    tracing::error!("Failed to pop from {}: {}", self.frontier.queue_key(), e);
                    return TickOutcome::StoreFailed { sent };
                }
            }
        }

        if sent > 0 {
            tracing::trace!("Dispatched {} URLs", sent);
        }
        TickOutcome::Completed { sent }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FrontierStore, MemoryStore, StoreError, StoreResult};
    use async_trait::async_trait;
    use std::sync::Arc;

    async fn seeded_frontier(urls: &[&str]) -> Frontier {
        let frontier = Frontier::new(Arc::new(MemoryStore::new()), "job");
        frontier.enqueue(urls).await.unwrap();
        frontier
    }

    #[tokio::test]
    async fn test_tick_moves_up_to_batch() {
        let frontier = seeded_frontier(&["http://x/1", "http://x/2", "http://x/3"]).await;
        let (tx, mut rx) = mpsc::channel(10);
        let dispatcher = Dispatcher::new(frontier.clone(), tx, 2, Duration::from_millis(10));

        assert_eq!(dispatcher.dispatch_tick().await, TickOutcome::Completed { sent: 2 });
        assert_eq!(rx.try_recv().unwrap(), "http://x/1");
        assert_eq!(rx.try_recv().unwrap(), "http://x/2");
        assert_eq!(frontier.pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_queue_is_not_an_error() {
        let frontier = seeded_frontier(&[]).await;
        let (tx, _rx) = mpsc::channel(10);
        let dispatcher = Dispatcher::new(frontier, tx, 5, Duration::from_millis(10));

        assert_eq!(dispatcher.dispatch_tick().await, TickOutcome::Completed { sent: 0 });
    }

    #[tokio::test]
    async fn test_full_channel_leaves_urls_queued() {
        let frontier = seeded_frontier(&["http://x/1", "http://x/2", "http://x/3"]).await;
        let (tx, mut rx) = mpsc::channel(1);
        let dispatcher = Dispatcher::new(frontier.clone(), tx, 3, Duration::from_millis(10));

        assert_eq!(dispatcher.dispatch_tick().await, TickOutcome::ChannelFull { sent: 1 });
        assert_eq!(frontier.pending().await.unwrap(), 2);

        // Nothing popped during back-pressure was lost
        assert_eq!(rx.try_recv().unwrap(), "http://x/1");
        assert_eq!(dispatcher.dispatch_tick().await, TickOutcome::ChannelFull { sent: 1 });
        assert_eq!(rx.try_recv().unwrap(), "http://x/2");
        assert_eq!(frontier.pop().await.unwrap().as_deref(), Some("http://x/3"));
    }

    #[tokio::test]
    async fn test_closed_channel_is_reported() {
        let frontier = seeded_frontier(&["http://x/1"]).await;
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let dispatcher = Dispatcher::new(frontier.clone(), tx, 4, Duration::from_millis(10));

        assert_eq!(dispatcher.dispatch_tick().await, TickOutcome::ChannelClosed);
        assert_eq!(frontier.pending().await.unwrap(), 1);
    }

    struct BrokenStore;

    #[async_trait]
    impl FrontierStore for BrokenStore {
        async fn set_add(&self, _key: &str, _member: &str) -> StoreResult<bool> {
            Ok(true)
        }
        async fn list_append(&self, _key: &str, _values: &[String]) -> StoreResult<()> {
            Ok(())
        }
        async fn list_pop_front(&self, _key: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Backend("unreachable".to_string()))
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
    async fn test_store_error_aborts_tick() {
        let frontier = Frontier::new(Arc::new(BrokenStore), "job");
        let (tx, _rx) = mpsc::channel(4);
        let dispatcher = Dispatcher::new(frontier, tx, 4, Duration::from_millis(10));

        assert_eq!(dispatcher.dispatch_tick().await, TickOutcome::StoreFailed { sent: 0 });
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel_and_closes_channel() {
        let frontier = seeded_frontier(&["http://x/1"]).await;
        let (tx, mut rx) = mpsc::channel(4);
        let dispatcher = Dispatcher::new(frontier, tx, 4, Duration::from_millis(5));
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(dispatcher.run(shutdown.clone()));
        assert_eq!(rx.recv().await.as_deref(), Some("http://x/1"));

        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }
}
