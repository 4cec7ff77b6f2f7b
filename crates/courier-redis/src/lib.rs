//! courier-redis
//!
//! Redis implementation of the courier `Store` port.
//!
//! # 接続の使い分け
//! - 通常のコマンド: `ConnectionManager`（自動再接続、clone して共有）
//! - `BLPOP`: 専用の multiplexed connection。blocking command は他の
//!   コマンドと同じ接続に流さない
//!
//! Key prefixes are applied by the queue (`QueueConfig::key_prefix`), so this
//! crate stores keys exactly as given.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use courier_core::StoreError;
use courier_core::ports::Store;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RedisConfig {
    pub url: String,

    /// Idle dedicated connections kept for blocking pops.
    pub max_idle_blocking: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            max_idle_blocking: 4,
        }
    }
}

pub struct RedisStore {
    client: redis::Client,
    manager: ConnectionManager,
    blocking: Mutex<Vec<MultiplexedConnection>>,
    max_idle_blocking: usize,
}

impl RedisStore {
    /// Open the client and establish the shared connection.
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(config.url.as_str()).map_err(StoreError::backend)?;
        let manager = ConnectionManager::new(client.clone())
            .await
            .map_err(StoreError::backend)?;
        tracing::info!(url = %config.url, "connected to redis");
        Ok(Self {
            client,
            manager,
            blocking: Mutex::new(Vec::new()),
            max_idle_blocking: config.max_idle_blocking,
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }

    async fn checkout_blocking(&self) -> Result<MultiplexedConnection, StoreError> {
        if let Some(conn) = self.blocking.lock().await.pop() {
            return Ok(conn);
        }
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::backend)
    }

    async fn checkin_blocking(&self, conn: MultiplexedConnection) {
        let mut idle = self.blocking.lock().await;
        if idle.len() < self.max_idle_blocking {
            idle.push(conn);
        }
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn list_push(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let len: u64 = redis::cmd("RPUSH")
            .arg(key)
            .arg(value)
            .query_async(&mut self.conn())
            .await
            .map_err(StoreError::backend)?;
        Ok(len)
    }

    async fn list_push_front(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let len: u64 = redis::cmd("LPUSH")
            .arg(key)
            .arg(value)
            .query_async(&mut self.conn())
            .await
            .map_err(StoreError::backend)?;
        Ok(len)
    }

    async fn list_blocking_pop(&self, key: &str) -> Result<String, StoreError> {
        let mut conn = self.checkout_blocking().await?;
        // timeout 0 = 無期限。BLPOP は (key, value) を返す
        let popped: Result<(String, String), redis::RedisError> = redis::cmd("BLPOP")
            .arg(key)
            .arg(0)
            .query_async(&mut conn)
            .await;
        match popped {
            Ok((_key, value)) => {
                self.checkin_blocking(conn).await;
                Ok(value)
            }
            // 壊れているかもしれない接続は戻さない
            Err(err) => Err(StoreError::backend(err)),
        }
    }

    async fn list_len(&self, key: &str) -> Result<u64, StoreError> {
        let len: u64 = redis::cmd("LLEN")
            .arg(key)
            .query_async(&mut self.conn())
            .await
            .map_err(StoreError::backend)?;
        Ok(len)
    }

    async fn sorted_set_insert(
        &self,
        key: &str,
        member: &str,
        score: f64,
    ) -> Result<u64, StoreError> {
        let added: u64 = redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async(&mut self.conn())
            .await
            .map_err(StoreError::backend)?;
        Ok(added)
    }

    async fn sorted_set_range_with_scores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let entries: Vec<(String, f64)> = redis::cmd("ZRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .arg("WITHSCORES")
            .query_async(&mut self.conn())
            .await
            .map_err(StoreError::backend)?;
        Ok(entries)
    }

    async fn sorted_set_remove(&self, key: &str, member: &str) -> Result<u64, StoreError> {
        let removed: u64 = redis::cmd("ZREM")
            .arg(key)
            .arg(member)
            .query_async(&mut self.conn())
            .await
            .map_err(StoreError::backend)?;
        Ok(removed)
    }

    async fn sorted_set_len(&self, key: &str) -> Result<u64, StoreError> {
        let len: u64 = redis::cmd("ZCARD")
            .arg(key)
            .query_async(&mut self.conn())
            .await
            .map_err(StoreError::backend)?;
        Ok(len)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.conn())
            .await
            .map_err(StoreError::backend)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            // PX は 0 を受け付けない
            cmd.arg("PX").arg(ttl.as_millis().max(1) as u64);
        }
        let _: () = cmd
            .query_async(&mut self.conn())
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let removed: u64 = redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut self.conn())
            .await
            .map_err(StoreError::backend)?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    //! 実サーバーが必要: `REDIS_URL=redis://... cargo test -p courier-redis -- --ignored`

    use super::*;
    use std::sync::Arc;

    async fn store() -> RedisStore {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| RedisConfig::default().url);
        RedisStore::connect(&RedisConfig {
            url,
            ..RedisConfig::default()
        })
        .await
        .unwrap()
    }

    fn key(name: &str) -> String {
        format!("courier-test:{}:{name}", std::process::id())
    }

    #[tokio::test]
    #[ignore = "requires a running redis server"]
    async fn list_push_and_blocking_pop() {
        let store = Arc::new(store().await);
        let key = key("list");
        store.delete(&[key.as_str()]).await.unwrap();

        let waiter = tokio::spawn({
            let store = store.clone();
            let key = key.clone();
            async move { store.list_blocking_pop(&key).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.list_push(&key, "m1").await.unwrap(), 1);
        assert_eq!(waiter.await.unwrap().unwrap(), "m1");

        store.list_push(&key, "m2").await.unwrap();
        store.list_push(&key, "m3").await.unwrap();
        assert_eq!(store.list_len(&key).await.unwrap(), 2);
        assert_eq!(store.list_blocking_pop(&key).await.unwrap(), "m2");

        assert_eq!(store.list_push_front(&key, "m1").await.unwrap(), 2);
        assert_eq!(store.list_blocking_pop(&key).await.unwrap(), "m1");
        store.delete(&[key.as_str()]).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running redis server"]
    async fn sorted_set_range_remove() {
        let store = store().await;
        let key = key("zset");
        store.delete(&[key.as_str()]).await.unwrap();

        assert_eq!(store.sorted_set_insert(&key, "late", 20.0).await.unwrap(), 1);
        assert_eq!(store.sorted_set_insert(&key, "early", 10.0).await.unwrap(), 1);
        assert_eq!(store.sorted_set_insert(&key, "early", 5.0).await.unwrap(), 0);

        let head = store.sorted_set_range_with_scores(&key, 0, 0).await.unwrap();
        assert_eq!(head, vec![("early".to_string(), 5.0)]);

        assert_eq!(store.sorted_set_remove(&key, "early").await.unwrap(), 1);
        assert_eq!(store.sorted_set_remove(&key, "early").await.unwrap(), 0);
        assert_eq!(store.sorted_set_len(&key).await.unwrap(), 1);
        store.delete(&[key.as_str()]).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running redis server"]
    async fn get_set_with_ttl() {
        let store = store().await;
        let key = key("value");

        store.set(&key, "v", Some(Duration::from_millis(200))).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.get(&key).await.unwrap(), None);
        assert_eq!(store.delete(&[key.as_str()]).await.unwrap(), 0);
    }
}
