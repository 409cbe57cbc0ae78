//! Redis cache module for the rideshare services
//!
//! This module provides functionality for connecting to Redis and performing
//! the key operations the services need: TTL-bound writes for one-time codes
//! and cached rides, reads, single-use reads and deletes.

use std::sync::OnceLock;

use anyhow::Result;
use redis::{AsyncCommands, Client, Script};
use serde::{Serialize, de::DeserializeOwned};
use tracing::info;

/// Writes ARGV[1] unless the stored JSON document carries a higher `version`
const SET_IF_NEWER: &str = r#"
local current = redis.call('GET', KEYS[1])
if current then
    local ok, stored = pcall(cjson.decode, current)
    if ok and type(stored) == 'table' and tonumber(stored.version)
        and tonumber(stored.version) > tonumber(ARGV[2]) then
        return 0
    end
end
redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[3])
return 1
"#;

static SET_IF_NEWER_SCRIPT: OnceLock<Script> = OnceLock::new();

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    pub fn from_env() -> Result<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        Ok(RedisConfig { url })
    }
}

/// Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
}

impl RedisPool {
    /// Initialize a new Redis client; connections are opened lazily
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.clone())?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(RedisPool { client })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    /// Set a key-value pair in Redis with optional TTL
    pub async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let mut conn = self.get_connection().await?;

        if let Some(ttl) = ttl_seconds {
            let _: () = conn.set_ex(key, value, ttl).await?;
        } else {
            let _: () = conn.set(key, value).await?;
        }

        Ok(())
    }

    /// Get a value from Redis by key
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    /// Read a key and delete it in the same round trip
    pub async fn take(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_connection().await?;
        let (value, _): (Option<String>, u64) = redis::pipe()
            .atomic()
            .get(key)
            .del(key)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    /// Serialize a value as JSON and store it with a TTL
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        self.set(key, &payload, Some(ttl_seconds)).await
    }

    /// Store a versioned JSON document unless a newer version is already cached
    ///
    /// The stored document's `version` field is compared inside Redis, so a
    /// slow writer holding an old copy cannot overwrite a fresher one. Returns
    /// whether the value was written.
    pub async fn set_json_if_newer<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        version: i64,
        ttl_seconds: u64,
    ) -> Result<bool> {
        let payload = serde_json::to_string(value)?;
        let script = SET_IF_NEWER_SCRIPT.get_or_init(|| Script::new(SET_IF_NEWER));

        let mut conn = self.get_connection().await?;
        let written: i64 = script
            .key(key)
            .arg(payload)
            .arg(version)
            .arg(ttl_seconds)
            .invoke_async(&mut conn)
            .await?;
        Ok(written == 1)
    }

    /// Read a JSON value stored with [`RedisPool::set_json`]
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Delete a key from Redis
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let _: u64 = conn.del(key).await?;
        Ok(())
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn local_pool() -> Result<RedisPool> {
        let config = RedisConfig {
            url: "redis://localhost:6379".to_string(),
        };
        RedisPool::new(&config).await
    }

    #[tokio::test]
    async fn test_new_rejects_malformed_url() {
        let config = RedisConfig {
            url: "not a redis url".to_string(),
        };
        assert!(RedisPool::new(&config).await.is_err());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_take_is_single_use() -> Result<()> {
        let pool = local_pool().await?;
        pool.set("test_take_key", "123456", Some(5)).await?;

        assert_eq!(pool.take("test_take_key").await?, Some("123456".to_string()));
        assert_eq!(pool.take("test_take_key").await?, None);
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_json_round_trip() -> Result<()> {
        let pool = local_pool().await?;
        pool.set_json("test_json_key", &vec![1, 2, 3], 5).await?;

        let value: Option<Vec<i32>> = pool.get_json("test_json_key").await?;
        assert_eq!(value, Some(vec![1, 2, 3]));

        pool.delete("test_json_key").await?;
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_older_version_does_not_overwrite_newer() -> Result<()> {
        #[derive(Serialize)]
        struct Doc {
            version: i64,
        }

        let pool = local_pool().await?;
        pool.delete("test_versioned_key").await?;

        assert!(pool.set_json_if_newer("test_versioned_key", &Doc { version: 2 }, 2, 5).await?);
        assert!(!pool.set_json_if_newer("test_versioned_key", &Doc { version: 1 }, 1, 5).await?);
        assert!(pool.set_json_if_newer("test_versioned_key", &Doc { version: 3 }, 3, 5).await?);

        let stored: Option<serde_json::Value> = pool.get_json("test_versioned_key").await?;
        assert_eq!(stored, Some(serde_json::json!({ "version": 3 })));

        pool.delete("test_versioned_key").await?;
        Ok(())
    }
}
