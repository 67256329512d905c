use std::{collections::HashMap, sync::Arc};

use redis::{aio::ConnectionManager, AsyncCommands};
use tokio::sync::RwLock;

use crate::error::{AppError, Result};

/// String key-value storage for per-wallet state.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    /// Atomically adds `delta` to an integer value (missing counts as 0) and returns the result.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;
    /// Atomically adds `delta` to a float value (missing counts as 0) and returns the result.
    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64>;
    fn name(&self) -> &'static str;
}

#[derive(Clone, Default)]
pub struct MemoryKvStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut entries = self.entries.write().await;
        let current = match entries.get(key) {
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                AppError::Internal(format!("value at {} is not an integer", key))
            })?,
            None => 0,
        };
        let next = current.saturating_add(delta);
        entries.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64> {
        let mut entries = self.entries.write().await;
        let current = match entries.get(key) {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|_| AppError::Internal(format!("value at {} is not a float", key)))?,
            None => 0.0,
        };
        let next = current + delta;
        entries.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Clone)]
pub struct RedisKvStore {
    conn: ConnectionManager,
}

impl RedisKvStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait::async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    // INCRBY
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.incr(key, delta).await?)
    }

    // INCRBYFLOAT
    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64> {
        let mut conn = self.conn.clone();
        Ok(conn.incr(key, delta).await?)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trips_and_deletes() {
        let store = MemoryKvStore::new();
        assert_eq!(store.get("k").await.expect("get"), None);

        store.set("k", "v1").await.expect("set");
        store.set("k", "v2").await.expect("overwrite");
        assert_eq!(store.get("k").await.expect("get").as_deref(), Some("v2"));

        store.delete("k").await.expect("delete");
        assert_eq!(store.get("k").await.expect("get"), None);
    }

    #[tokio::test]
    async fn memory_counters_start_at_zero_and_reject_text() {
        let store = MemoryKvStore::new();
        assert_eq!(store.incr_by("n", -1).await.expect("decr"), -1);
        assert_eq!(store.incr_by("n", 3).await.expect("incr"), 2);
        assert_eq!(store.incr_by_float("f", 1.5).await.expect("incr"), 1.5);
        assert_eq!(store.incr_by_float("f", 0.25).await.expect("incr"), 1.75);
        assert_eq!(store.get("f").await.expect("get").as_deref(), Some("1.75"));

        store.set("t", "abc").await.expect("set");
        assert!(store.incr_by("t", 1).await.is_err());
    }

    #[tokio::test]
    async fn memory_store_clones_share_entries() {
        let store = MemoryKvStore::new();
        let other = store.clone();
        store.set("shared", "1").await.expect("set");
        assert_eq!(other.get("shared").await.expect("get").as_deref(), Some("1"));
    }
}
