//! Fixed-window rate limiting backends.
//!
//! Redis is used when `REDIS_URL` is configured so limits hold across
//! instances; otherwise counters live in process memory.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};

use crate::config::{CACHE_PREFIX_RATE_LIMIT, RATE_LIMIT_SWEEP_SECONDS};
use crate::errors::{AppError, AppResult};

/// A fixed-window request counter.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one request for `identifier` and report `(count, allowed)`.
    async fn check_rate_limit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<(u64, bool)>;

    /// Backend health
    async fn ping(&self) -> AppResult<()>;

    /// Short name used in health output
    fn backend(&self) -> &'static str;
}

/// Redis-backed limiter with a pooled connection manager.
#[derive(Clone)]
pub struct Cache {
    connection: ConnectionManager,
}

impl Cache {
    /// Connect to Redis.
    pub async fn try_connect(redis_url: &str) -> Result<Self, RedisError> {
        let client = Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;

        tracing::info!("Redis rate limiter connected");

        Ok(Self { connection })
    }
}

#[async_trait]
impl RateLimiter for Cache {
    async fn check_rate_limit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<(u64, bool)> {
        let key = format!("{}{}", CACHE_PREFIX_RATE_LIMIT, identifier);
        let mut conn = self.connection.clone();

        let count: i64 = conn.incr(&key, 1).await.map_err(cache_error)?;
        if count == 1 {
            // First request opens the window
            let _: () = conn
                .expire(&key, window_seconds as i64)
                .await
                .map_err(cache_error)?;
        }

        let count = count.max(0) as u64;
        Ok((count, count <= max_requests))
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

fn cache_error(e: RedisError) -> AppError {
    AppError::internal(format!("Cache error: {}", e))
}

/// One client's counter
struct Window {
    started: Instant,
    length: Duration,
    count: u64,
}

impl Window {
    fn open(now: Instant, length: Duration) -> Self {
        Self {
            started: now,
            length,
            count: 0,
        }
    }

    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.started) >= self.length
    }
}

struct Windows {
    by_client: HashMap<String, Window>,
    last_sweep: Instant,
}

/// In-process limiter for single-instance deployments and tests.
///
/// Expired windows are reset when their client returns and swept out of the
/// map periodically, each against its own length.
pub struct MemoryRateLimiter {
    windows: Mutex<Windows>,
    sweep_interval: Duration,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::with_sweep_interval(Duration::from_secs(RATE_LIMIT_SWEEP_SECONDS))
    }

    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        Self {
            windows: Mutex::new(Windows {
                by_client: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            sweep_interval,
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.windows.lock().map(|w| w.by_client.len()).unwrap_or(0)
    }
}

impl Default for MemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check_rate_limit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<(u64, bool)> {
        let now = Instant::now();
        let length = Duration::from_secs(window_seconds);

        let mut windows = self
            .windows
            .lock()
            .map_err(|_| AppError::internal("Rate limiter state poisoned"))?;

        if now.duration_since(windows.last_sweep) >= self.sweep_interval {
            windows.by_client.retain(|_, window| !window.expired(now));
            windows.last_sweep = now;
        }

        let window = windows
            .by_client
            .entry(identifier.to_string())
            .or_insert_with(|| Window::open(now, length));
        if window.expired(now) {
            *window = Window::open(now, length);
        }
        window.count += 1;

        Ok((window.count, window.count <= max_requests))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
