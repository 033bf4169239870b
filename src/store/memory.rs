//! In-process store with the same list semantics as Redis.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use super::Store;
use crate::error::StoreError;

/// Store that keeps every list in memory.
///
/// Each operation takes a single lock, so push and pop are atomic with
/// respect to other tasks sharing the same instance.
#[derive(Default)]
pub struct MemoryStore {
    lists: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    pushed: Notify,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn pop_first(&self, keys: &[String]) -> Option<(String, Vec<u8>)> {
        let mut lists = self.lists.lock().await;
        for key in keys {
            if let Some(list) = lists.get_mut(key) {
                if let Some(payload) = list.pop_front() {
                    if list.is_empty() {
                        lists.remove(key);
                    }
                    return Some((key.clone(), payload));
                }
            }
        }
        None
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn push(&self, key: &str, payload: Vec<u8>) -> Result<(), StoreError> {
        self.lists
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .push_back(payload);
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn pop(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let keys = [key.to_string()];
        Ok(self.pop_first(&keys).await.map(|(_, payload)| payload))
    }

    async fn blocking_pop(
        &self,
        keys: &[String],
        timeout: Duration,
    ) -> Result<Option<(String, Vec<u8>)>, StoreError> {
        let deadline = Instant::now() + timeout;

        loop {
            // Register interest before checking so a push in between is not missed.
            let pushed = self.pushed.notified();

            if let Some(hit) = self.pop_first(keys).await {
                return Ok(Some(hit));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            if tokio::time::timeout(remaining, pushed).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        Ok(self.lists.lock().await.get(key).map_or(0, VecDeque::len))
    }

    async fn range(&self, key: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        Ok(self
            .lists
            .lock()
            .await
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.lists.lock().await.remove(key);
        Ok(())
    }
}
