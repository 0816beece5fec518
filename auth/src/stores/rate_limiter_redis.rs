//! Redis-based rate limiter.
//!
//! Sliding window over a sorted set:
//! 1. drop entries older than the window (`ZREMRANGEBYSCORE`)
//! 2. count what remains (`ZCARD`)
//! 3. reject or record (`ZADD`)
//!
//! Counters live entirely in Redis, so every service instance observes
//! the same window.

use crate::error::{AuthError, Result};
use crate::providers::RateLimiter;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Redis-backed sliding-window rate limiter.
#[derive(Clone)]
pub struct RedisRateLimiter {
    conn_manager: ConnectionManager,
}

impl RedisRateLimiter {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns error if the connection cannot be established.
    pub async fn new(redis_url: &str) -> Result<Self> {
        Ok(Self {
            conn_manager: super::connect(redis_url).await?,
        })
    }

    fn rate_key(key: &str) -> String {
        format!("rate_limit:{key}")
    }

    #[allow(clippy::cast_possible_truncation)]
    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }

    async fn prune(
        conn: &mut ConnectionManager,
        rate_key: &str,
        window: Duration,
    ) -> Result<()> {
        #[allow(clippy::cast_possible_truncation)]
        let window_start = Self::now_ms().saturating_sub(window.as_millis() as u64);
        #[allow(clippy::cast_possible_wrap)]
        let _: () = conn
            .zrembyscore(rate_key, 0, window_start as isize)
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("rate limit prune: {e}")))?;
        Ok(())
    }
}

impl RateLimiter for RedisRateLimiter {
    async fn check_and_record(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let rate_key = Self::rate_key(key);

        Self::prune(&mut conn, &rate_key, window).await?;

        let count: u64 = conn
            .zcard(&rate_key)
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("rate limit count: {e}")))?;

        if count >= u64::from(max_attempts) {
            tracing::warn!(key = %key, count, max_attempts, "rate limit exceeded");
            return Err(AuthError::RateLimited {
                retry_after: window,
            });
        }

        let now = Self::now_ms();
        let _: () = conn
            .zadd(&rate_key, now, now)
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("rate limit record: {e}")))?;
        // Window plus slack so idle keys clean themselves up.
        #[allow(clippy::cast_possible_wrap)]
        let _: () = conn
            .expire(&rate_key, window.as_secs() as i64 + 3600)
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("rate limit expire: {e}")))?;

        Ok(())
    }

    async fn attempts(&self, key: &str, window: Duration) -> Result<u32> {
        let mut conn = self.conn_manager.clone();
        let rate_key = Self::rate_key(key);

        Self::prune(&mut conn, &rate_key, window).await?;

        let count: u64 = conn
            .zcard(&rate_key)
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("rate limit count: {e}")))?;

        #[allow(clippy::cast_possible_truncation)]
        Ok(count.min(u64::from(u32::MAX)) as u32)
    }

    async fn reset(&self, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .del(Self::rate_key(key))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("rate limit reset: {e}")))?;
        Ok(())
    }
}
