//! Redis-backed store.
//!
//! Uses a `ConnectionManager`, which reconnects automatically. Note that a
//! `BLPOP` issued through a shared connection holds that connection until it
//! returns, so a worker should own its store rather than share it with
//! producers in the same process.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::Store;
use crate::error::StoreError;

/// Store backed by a Redis server.
#[derive(Clone)]
pub struct RedisStore {
    /// Redis connection manager (handles reconnection automatically).
    redis: ConnectionManager,
}

impl RedisStore {
    /// Connects to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConnectionFailed` if the connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        let redis = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        Ok(Self { redis })
    }

    /// Wraps an existing connection manager.
    pub fn from_connection(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn push(&self, key: &str, payload: Vec<u8>) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        conn.rpush::<_, _, ()>(key, payload).await?;
        Ok(())
    }

    async fn pop(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.redis.clone();
        let payload: Option<Vec<u8>> = redis::cmd("LPOP").arg(key).query_async(&mut conn).await?;
        Ok(payload)
    }

    async fn blocking_pop(
        &self,
        keys: &[String],
        timeout: Duration,
    ) -> Result<Option<(String, Vec<u8>)>, StoreError> {
        if keys.is_empty() {
            return Ok(None);
        }

        let mut conn = self.redis.clone();
        // BLPOP treats 0 as "wait forever"; callers always want a bound.
        let timeout_secs = timeout.as_secs().max(1) as usize;

        let result: Option<(String, Vec<u8>)> = redis::cmd("BLPOP")
            .arg(keys)
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await?;

        Ok(result)
    }

    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        let mut conn = self.redis.clone();
        let len: usize = conn.llen(key).await?;
        Ok(len)
    }

    async fn range(&self, key: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut conn = self.redis.clone();
        let payloads: Vec<Vec<u8>> = conn.lrange(key, 0, -1).await?;
        Ok(payloads)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}
