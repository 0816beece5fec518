//! Redis-based one-time code store.
//!
//! One key per (user, channel): `otp:{user_id}:{channel}`. A fresh
//! `SET` replaces the outstanding code; consumption is `GETDEL`, so
//! concurrent submissions observe at most one code.

use crate::error::{AuthError, Result};
use crate::providers::{OneTimeCode, OneTimeCodeStore, OtpChannel};
use crate::state::UserId;
use chrono::Utc;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Redis-backed one-time code store.
#[derive(Clone)]
pub struct RedisOneTimeCodeStore {
    conn_manager: ConnectionManager,
}

impl RedisOneTimeCodeStore {
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

    fn code_key(user_id: UserId, channel: OtpChannel) -> String {
        format!("otp:{}:{}", user_id.0, channel)
    }
}

impl OneTimeCodeStore for RedisOneTimeCodeStore {
    async fn put(&self, code: &OneTimeCode) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let bytes =
            bincode::serialize(code).map_err(|e| AuthError::SerializationError(e.to_string()))?;

        #[allow(clippy::cast_sign_loss)]
        let ttl_secs = (code.expires_at - Utc::now()).num_seconds().max(1) as u64;

        let _: () = conn
            .set_ex(Self::code_key(code.user_id, code.channel), bytes, ttl_secs)
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("code put: {e}")))?;

        tracing::debug!(
            user_id = %code.user_id.0,
            channel = %code.channel,
            ttl_secs,
            "one-time code stored"
        );
        Ok(())
    }

    async fn take(&self, user_id: UserId, channel: OtpChannel) -> Result<Option<OneTimeCode>> {
        let mut conn = self.conn_manager.clone();
        let bytes: Option<Vec<u8>> = conn
            .get_del(Self::code_key(user_id, channel))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("code take: {e}")))?;

        match bytes {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes)
                    .map_err(|e| AuthError::SerializationError(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }
}
