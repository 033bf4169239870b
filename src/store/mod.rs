//! Backing stores for queues.
//!
//! A queue is a view over one list-valued key. Everything durable lives in the
//! store, and all coordination between workers relies on the store's atomic
//! list operations:
//!
//! - `push` appends to the tail (RPUSH)
//! - `pop` removes the head (LPOP)
//! - `blocking_pop` waits on several keys and pops from the first non-empty
//!   one in key order (BLPOP)
//!
//! Two implementations are provided: [`RedisStore`] for production and
//! [`MemoryStore`] for tests and single-process use.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Atomic list operations a queue needs from its store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Appends a payload to the tail of the list at `key`.
    async fn push(&self, key: &str, payload: Vec<u8>) -> Result<(), StoreError>;

    /// Removes and returns the head of the list at `key`.
    async fn pop(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Waits up to `timeout` for any of `keys` to hold data, then pops the head
    /// of the first non-empty key in the given order.
    ///
    /// Returns the key the payload was taken from.
    async fn blocking_pop(
        &self,
        keys: &[String],
        timeout: Duration,
    ) -> Result<Option<(String, Vec<u8>)>, StoreError>;

    /// Returns the number of payloads at `key`.
    async fn len(&self, key: &str) -> Result<usize, StoreError>;

    /// Returns every payload at `key`, head first, without removing them.
    async fn range(&self, key: &str) -> Result<Vec<Vec<u8>>, StoreError>;

    /// Removes `key` entirely.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
