//! Redis cache backend.
//!
//! Keys are `{prefix}{fingerprint}` and carry native TTL (`SET .. EX`).
//! The pool connects lazily on first use. Every operation is bounded by the
//! configured timeout, and after a failed connection the backend refuses
//! work for a cool-down window instead of paying the timeout on every call.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime, Timeouts};
use tracing::{debug, info, warn};

use super::error::{CacheError, CacheResult};
use super::CacheBackend;
use crate::core::Fingerprint;

/// Connection settings for the Redis backend
#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: String,
    pub key_prefix: String,
    /// Bound on connect and on each command
    pub timeout: Duration,
    /// How long to skip Redis after a connection failure
    pub cooldown: Duration,
    pub pool_size: usize,
}

/// Redis-backed cache
pub struct RedisBackend {
    pool: Pool,
    settings: RedisSettings,
    /// When the last connection failure happened
    last_failure: Mutex<Option<Instant>>,
}

impl RedisBackend {
    /// Create the backend. No connection is made until first use.
    pub fn new(settings: RedisSettings) -> CacheResult<Self> {
        info!(prefix = %settings.key_prefix, "Initializing Redis cache backend");

        let mut config = Config::from_url(settings.url.clone());
        let mut pool_config = PoolConfig::new(settings.pool_size.max(1));
        pool_config.timeouts = Timeouts {
            wait: Some(settings.timeout),
            create: Some(settings.timeout),
            recycle: Some(settings.timeout),
        };
        config.pool = Some(pool_config);

        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::connection(format!("Failed to create Redis pool: {}", e)))?;

        Ok(Self {
            pool,
            settings,
            last_failure: Mutex::new(None),
        })
    }

    /// Generate key with prefix
    fn make_key(&self, key: &Fingerprint) -> String {
        format!("{}{}", self.settings.key_prefix, key)
    }

    /// Generate pattern for key scanning
    fn make_pattern(&self, pattern: &str) -> String {
        format!("{}{}", self.settings.key_prefix, pattern)
    }

    fn cooling_down(&self) -> bool {
        let guard = match self.last_failure.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .map(|at| at.elapsed() < self.settings.cooldown)
            .unwrap_or(false)
    }

    fn record_failure(&self, failed: bool) {
        let mut guard = match self.last_failure.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = if failed { Some(Instant::now()) } else { None };
    }

    /// Get a pooled connection, honoring the cool-down window
    async fn connection(&self) -> CacheResult<Connection> {
        if self.cooling_down() {
            return Err(CacheError::unavailable("Redis cooling down after connection failure"));
        }

        let result = tokio::time::timeout(self.settings.timeout, self.pool.get()).await;

        match result {
            Ok(Ok(conn)) => {
                self.record_failure(false);
                Ok(conn)
            }
            Ok(Err(e)) => {
                warn!(error = %e, cooldown_secs = self.settings.cooldown.as_secs(), "Redis connection failed");
                self.record_failure(true);
                Err(CacheError::connection(e))
            }
            Err(_) => {
                warn!(cooldown_secs = self.settings.cooldown.as_secs(), "Redis connection timed out");
                self.record_failure(true);
                Err(CacheError::Timeout(self.settings.timeout))
            }
        }
    }

    /// Run one command future under the operation timeout
    async fn bounded<T, F>(&self, fut: F) -> CacheResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.settings.timeout, fut).await {
            Ok(result) => result.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout(self.settings.timeout)),
        }
    }

    /// Collect every key matching a pattern with SCAN
    async fn scan_keys(&self, conn: &mut Connection, pattern: &str) -> CacheResult<Vec<String>> {
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = self
                .bounded(
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(500)
                        .query_async(&mut *conn),
                )
                .await?;

            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &Fingerprint) -> CacheResult<Option<String>> {
        let mut conn = self.connection().await?;
        let redis_key = self.make_key(key);

        let value: Option<String> = self
            .bounded(redis::cmd("GET").arg(&redis_key).query_async(&mut conn))
            .await?;

        debug!(key = %redis_key, hit = value.is_some(), "Redis GET");
        Ok(value)
    }

    async fn put(&self, key: &Fingerprint, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let redis_key = self.make_key(key);
        // EX 0 is rejected by the server
        let ttl_secs = ttl.as_secs().max(1);

        let _: () = self
            .bounded(
                redis::cmd("SET")
                    .arg(&redis_key)
                    .arg(value)
                    .arg("EX")
                    .arg(ttl_secs)
                    .query_async(&mut conn),
            )
            .await?;

        Ok(())
    }

    async fn remove(&self, key: &Fingerprint) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let _: i64 = self
            .bounded(redis::cmd("DEL").arg(self.make_key(key)).query_async(&mut conn))
            .await?;
        Ok(())
    }

    async fn clear(&self, pattern: &str) -> CacheResult<usize> {
        let mut conn = self.connection().await?;
        let keys = self.scan_keys(&mut conn, &self.make_pattern(pattern)).await?;

        let mut removed = 0usize;
        for chunk in keys.chunks(500) {
            let deleted: i64 = self
                .bounded(redis::cmd("DEL").arg(chunk).query_async(&mut conn))
                .await?;
            removed += usize::try_from(deleted).unwrap_or(0);
        }

        Ok(removed)
    }

    async fn entry_count(&self) -> CacheResult<usize> {
        let mut conn = self.connection().await?;
        let keys = self.scan_keys(&mut conn, &self.make_pattern("*")).await?;
        Ok(keys.len())
    }

    async fn size_bytes(&self) -> CacheResult<Option<u64>> {
        Ok(None)
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let _: String = self
            .bounded(redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str) -> RedisSettings {
        RedisSettings {
            url: url.to_string(),
            key_prefix: "finiq:strategy:".to_string(),
            timeout: Duration::from_millis(200),
            cooldown: Duration::from_secs(30),
            pool_size: 2,
        }
    }

    #[test]
    fn test_key_prefixing() {
        let backend = RedisBackend::new(settings("redis://127.0.0.1:6379")).unwrap();
        let fp = Fingerprint::from_raw("v1:abc");

        assert_eq!(backend.make_key(&fp), "finiq:strategy:v1:abc");
        assert_eq!(backend.make_pattern("v1:*"), "finiq:strategy:v1:*");
    }

    #[tokio::test]
    async fn test_unreachable_server_enters_cooldown() {
        // Port 1 is never a Redis server
        let backend = RedisBackend::new(settings("redis://127.0.0.1:1")).unwrap();
        let fp = Fingerprint::from_raw("v1:abc");

        assert!(backend.get(&fp).await.is_err());
        assert!(backend.cooling_down());

        let second = backend.get(&fp).await;
        assert!(matches!(second, Err(CacheError::Unavailable(_))));
    }
}
