//! Mock rate limiter.
//!
//! In-memory sliding window. Entries outside the window are dropped on
//! each check for that key; long-running tests can `reset` keys to
//! reclaim memory.

use super::lock;
use crate::error::{AuthError, Result};
use crate::providers::RateLimiter;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// In-memory rate limiter for testing.
#[derive(Clone, Default)]
pub struct MockRateLimiter {
    /// Map of key -> recorded attempt timestamps (ms).
    attempts: Arc<Mutex<HashMap<String, Vec<u64>>>>,
}

impl MockRateLimiter {
    /// Create an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn window_ms(window: Duration) -> u64 {
        window.as_millis() as u64
    }
}

impl RateLimiter for MockRateLimiter {
    async fn check_and_record(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> Result<()> {
        let mut attempts = lock(&self.attempts)?;
        let now = Self::now_ms();
        let window_start = now.saturating_sub(Self::window_ms(window));

        let timestamps = attempts.entry(key.to_string()).or_default();
        timestamps.retain(|&ts| ts >= window_start);

        if timestamps.len() >= max_attempts as usize {
            tracing::warn!(
                key = %key,
                attempts = timestamps.len(),
                max_attempts,
                "mock rate limit exceeded"
            );
            return Err(AuthError::RateLimited {
                retry_after: window,
            });
        }

        timestamps.push(now);
        Ok(())
    }

    async fn attempts(&self, key: &str, window: Duration) -> Result<u32> {
        let attempts = lock(&self.attempts)?;
        let window_start = Self::now_ms().saturating_sub(Self::window_ms(window));
        #[allow(clippy::cast_possible_truncation)]
        Ok(attempts
            .get(key)
            .map(|timestamps| timestamps.iter().filter(|&&ts| ts >= window_start).count() as u32)
            .unwrap_or(0))
    }

    async fn reset(&self, key: &str) -> Result<()> {
        lock(&self.attempts)?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_within_limit_then_blocks() {
        let limiter = MockRateLimiter::new();
        let window = Duration::from_secs(60);

        for _ in 0..5 {
            limiter
                .check_and_record("user@example.com", 5, window)
                .await
                .unwrap();
        }
        let err = limiter
            .check_and_record("user@example.com", 5, window)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn attempts_counts_only_inside_window() {
        let limiter = MockRateLimiter::new();
        let window = Duration::from_millis(50);

        limiter
            .check_and_record("key", 10, window)
            .await
            .unwrap();
        assert_eq!(limiter.attempts("key", window).await.unwrap(), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(limiter.attempts("key", window).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reset_clears_the_key() {
        let limiter = MockRateLimiter::new();
        let window = Duration::from_secs(60);

        for _ in 0..3 {
            limiter.check_and_record("key", 3, window).await.unwrap();
        }
        limiter.reset("key").await.unwrap();
        assert!(limiter.check_and_record("key", 3, window).await.is_ok());
    }
}
