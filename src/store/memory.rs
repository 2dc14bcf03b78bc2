//! In-memory store implementation
//!
//! Process-local and non-durable. Useful for tests and one-shot crawls where
//! sharing the frontier between processes is not required.

use crate::store::traits::{FrontierStore, StoreResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    sets: HashMap<String, HashSet<String>>,
    lists: HashMap<String, VecDeque<String>>,
}

/// In-memory frontier store
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the list at `key`, head first
    pub async fn list_snapshot(&self, key: &str) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner
            .lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FrontierStore for MemoryStore {
    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn list_append(&self, key: &str, values: &[String]) -> StoreResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.lock().await;
        inner
            .lists
            .entry(key.to_string())
            .or_default()
            .extend(values.iter().cloned());
        Ok(())
    }

    async fn list_pop_front(&self, key: &str) -> StoreResult<Option<String>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.lists.get_mut(key).and_then(VecDeque::pop_front))
    }

    async fn list_len(&self, key: &str) -> StoreResult<u64> {
        let inner = self.inner.lock().await;
        Ok(inner.lists.get(key).map_or(0, |list| list.len() as u64))
    }

    async fn set_len(&self, key: &str) -> StoreResult<u64> {
        let inner = self.inner.lock().await;
        Ok(inner.sets.get(key).map_or(0, |set| set.len() as u64))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.sets.remove(key);
        inner.lists.remove(key);
        Ok(())
    }
}
