//! Production store implementations.
//!
//! Redis backs the ephemeral state (challenges, one-time codes,
//! sessions, rate-limit windows): every record is TTL-bounded and the
//! atomic operations the provider traits promise map onto single Redis
//! commands (`INCR`, `SADD`, `GETDEL`, `DEL`). Durable repositories
//! (users, enrolled factors, history) live behind the `postgres`
//! feature.

mod challenge_redis;
mod code_redis;
mod rate_limiter_redis;
mod session_redis;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use challenge_redis::RedisChallengeStore;
pub use code_redis::RedisOneTimeCodeStore;
pub use rate_limiter_redis::RedisRateLimiter;
pub use session_redis::RedisSessionStore;

use crate::error::{AuthError, Result};
use redis::Client;
use redis::aio::ConnectionManager;

/// Open a pooled Redis connection manager.
pub(crate) async fn connect(redis_url: &str) -> Result<ConnectionManager> {
    let client = Client::open(redis_url)
        .map_err(|e| AuthError::StorageUnavailable(format!("redis client: {e}")))?;
    ConnectionManager::new(client)
        .await
        .map_err(|e| AuthError::StorageUnavailable(format!("redis connection: {e}")))
}
