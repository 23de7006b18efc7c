//! Redis-backed event store

use async_trait::async_trait;
use holocron_core::{EventStore, HolocronError, Result};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Event store talking to a Redis server through a reconnecting connection
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    url: String,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("url", &self.url).finish()
    }
}

impl RedisStore {
    /// Connect to the server at `url`
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| map_error("open", e))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| map_error("connect", e))?;

        info!(url, "Connected to Redis");
        Ok(Self {
            manager,
            url: url.to_string(),
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

fn map_error(operation: &str, err: RedisError) -> HolocronError {
    if err.code() == Some("WRONGTYPE") {
        return HolocronError::wrong_type(operation, err.to_string());
    }
    debug!(operation, error = %err, "Redis command failed");
    HolocronError::store_unavailable(format!("{}: {}", operation, err))
}

#[async_trait]
impl EventStore for RedisStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn zincr_by(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        self.conn()
            .zincr(key, member, delta)
            .await
            .map_err(|e| map_error(key, e))
    }

    async fn zrevrange_with_scores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>> {
        self.conn()
            .zrevrange_withscores(key, start, stop)
            .await
            .map_err(|e| map_error(key, e))
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.conn()
            .hincr(key, field, delta)
            .await
            .map_err(|e| map_error(key, e))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.conn()
            .hset::<_, _, _, ()>(key, field, value)
            .await
            .map_err(|e| map_error(key, e))
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        self.conn()
            .hgetall(key)
            .await
            .map_err(|e| map_error(key, e))
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.conn()
            .incr(key, 1i64)
            .await
            .map_err(|e| map_error(key, e))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn().get(key).await.map_err(|e| map_error(key, e))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(|e| map_error(key, e))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .query_async::<_, bool>(&mut self.conn())
            .await
            .map_err(|e| map_error(key, e))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let seconds: i64 = redis::cmd("TTL")
            .arg(key)
            .query_async(&mut self.conn())
            .await
            .map_err(|e| map_error(key, e))?;

        // -2 absent, -1 persistent
        Ok(u64::try_from(seconds).ok().map(Duration::from_secs))
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let removed: i64 = self.conn().del(key).await.map_err(|e| map_error(key, e))?;
        Ok(removed > 0)
    }

    async fn flush(&self) -> Result<()> {
        redis::cmd("FLUSHDB")
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(|e| map_error("flushdb", e))
    }

    async fn ping(&self) -> Result<()> {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.conn())
            .await
            .map(|_| ())
            .map_err(|e| map_error("ping", e))
    }
}
