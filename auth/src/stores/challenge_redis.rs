//! Redis-based challenge store.
//!
//! # Layout
//!
//! - `challenge:{id}` → bincode [`Challenge`] (immutable fields)
//! - `challenge:{id}:failures` → failure counter (`INCR`)
//! - `challenge:{id}:satisfied` → set of satisfied factor names (`SADD`)
//! - `ceremony:{key}` → opaque ceremony state, consumed via `GETDEL`
//!
//! The counter and set commands are single atomic Redis operations, so
//! concurrent verification attempts serialize at the store without
//! locks. Every key carries a TTL slightly past the challenge expiry —
//! expiry is enforced by the orchestrator against the stored timestamp,
//! the TTL is hygiene.

use crate::error::{AuthError, Result};
use crate::providers::ChallengeStore;
use crate::state::{Challenge, ChallengeId, FactorType};
use chrono::{Duration, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::BTreeSet;

/// Seconds a key outlives its challenge, so late readers still observe
/// a consistent record instead of a partial one.
const TTL_SLACK_SECS: i64 = 60;

/// Redis-backed challenge store.
#[derive(Clone)]
pub struct RedisChallengeStore {
    conn_manager: ConnectionManager,
}

impl RedisChallengeStore {
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

    fn challenge_key(challenge_id: ChallengeId) -> String {
        format!("challenge:{}", challenge_id.0)
    }

    fn failures_key(challenge_id: ChallengeId) -> String {
        format!("challenge:{}:failures", challenge_id.0)
    }

    fn satisfied_key(challenge_id: ChallengeId) -> String {
        format!("challenge:{}:satisfied", challenge_id.0)
    }

    fn ceremony_key(key: &str) -> String {
        format!("ceremony:{key}")
    }

    async fn ensure_exists(
        conn: &mut ConnectionManager,
        challenge_id: ChallengeId,
    ) -> Result<()> {
        let exists: bool = conn
            .exists(Self::challenge_key(challenge_id))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("challenge exists: {e}")))?;
        if exists {
            Ok(())
        } else {
            Err(AuthError::ChallengeNotFound)
        }
    }
}

impl ChallengeStore for RedisChallengeStore {
    async fn insert(&self, challenge: &Challenge) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let bytes = bincode::serialize(challenge)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;

        #[allow(clippy::cast_sign_loss)]
        let ttl_secs = ((challenge.expires_at - Utc::now()).num_seconds() + TTL_SLACK_SECS)
            .max(1) as u64;

        let _: () = conn
            .set_ex(Self::challenge_key(challenge.challenge_id), bytes, ttl_secs)
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("challenge insert: {e}")))?;

        tracing::debug!(
            challenge_id = %challenge.challenge_id.0,
            ttl_secs,
            "challenge stored"
        );
        Ok(())
    }

    async fn fetch(&self, challenge_id: ChallengeId) -> Result<Option<Challenge>> {
        let mut conn = self.conn_manager.clone();
        let bytes: Option<Vec<u8>> = conn
            .get(Self::challenge_key(challenge_id))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("challenge fetch: {e}")))?;

        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let mut challenge: Challenge = bincode::deserialize(&bytes)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;

        // Overlay the live mutable state.
        let failures: Option<u32> = conn
            .get(Self::failures_key(challenge_id))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("challenge failures: {e}")))?;
        challenge.failed_attempts = failures.unwrap_or(0);

        let satisfied: Vec<String> = conn
            .smembers(Self::satisfied_key(challenge_id))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("challenge satisfied: {e}")))?;
        challenge.satisfied = satisfied
            .iter()
            .filter_map(|name| factor_from_name(name))
            .collect::<BTreeSet<_>>();

        Ok(Some(challenge))
    }

    async fn record_failure(&self, challenge_id: ChallengeId) -> Result<u32> {
        let mut conn = self.conn_manager.clone();
        Self::ensure_exists(&mut conn, challenge_id).await?;

        let count: i64 = conn
            .incr(Self::failures_key(challenge_id), 1)
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("failure incr: {e}")))?;
        let _: () = conn
            .expire(Self::failures_key(challenge_id), 600)
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("failure expire: {e}")))?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(count.max(0) as u32)
    }

    async fn record_satisfied(
        &self,
        challenge_id: ChallengeId,
        factor_type: FactorType,
    ) -> Result<u32> {
        let mut conn = self.conn_manager.clone();
        Self::ensure_exists(&mut conn, challenge_id).await?;

        let _: () = conn
            .sadd(Self::satisfied_key(challenge_id), factor_type.as_str())
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("satisfied add: {e}")))?;
        let _: () = conn
            .expire(Self::satisfied_key(challenge_id), 600)
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("satisfied expire: {e}")))?;

        let count: i64 = conn
            .scard(Self::satisfied_key(challenge_id))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("satisfied card: {e}")))?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(count.max(0) as u32)
    }

    async fn remove(&self, challenge_id: ChallengeId) -> Result<bool> {
        let mut conn = self.conn_manager.clone();

        // DEL on the primary key decides the winner; the side keys are
        // cleanup.
        let removed: i64 = conn
            .del(Self::challenge_key(challenge_id))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("challenge del: {e}")))?;
        let _: () = conn
            .del(Self::failures_key(challenge_id))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("failures del: {e}")))?;
        let _: () = conn
            .del(Self::satisfied_key(challenge_id))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("satisfied del: {e}")))?;

        Ok(removed > 0)
    }

    async fn put_ceremony(&self, key: &str, state: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        #[allow(clippy::cast_sign_loss)]
        let ttl_secs = ttl.num_seconds().max(1) as u64;
        let _: () = conn
            .set_ex(Self::ceremony_key(key), state, ttl_secs)
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("ceremony put: {e}")))?;
        Ok(())
    }

    async fn take_ceremony(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn_manager.clone();
        // GETDEL: single-use by construction.
        conn.get_del(Self::ceremony_key(key))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("ceremony take: {e}")))
    }
}

fn factor_from_name(name: &str) -> Option<FactorType> {
    match name {
        "password" => Some(FactorType::Password),
        "totp" => Some(FactorType::Totp),
        "sms_otp" => Some(FactorType::SmsOtp),
        "email_otp" => Some(FactorType::EmailOtp),
        "webauthn" => Some(FactorType::WebAuthn),
        "backup_code" => Some(FactorType::BackupCode),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn factor_names_round_trip() {
        for factor in FactorType::second_factors() {
            assert_eq!(factor_from_name(factor.as_str()), Some(factor));
        }
        assert_eq!(factor_from_name("unknown"), None);
    }
}
