//! Redis-based session store.
//!
//! # Layout
//!
//! - `session:{id}` → bincode [`Session`]
//! - `session_access:{hash}` → session id (lookup index)
//! - `session_refresh:{hash}` → session id (lookup index)
//! - `user_sessions:{user_id}` → set of session ids
//!
//! All keys expire with the refresh deadline; lookups go through the
//! hash indexes so raw tokens never appear in storage.

use crate::error::{AuthError, Result};
use crate::providers::SessionStore;
use crate::state::{Session, SessionId, UserId};
use chrono::Utc;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Redis-backed session store.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn_manager: ConnectionManager,
}

impl RedisSessionStore {
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

    fn session_key(session_id: SessionId) -> String {
        format!("session:{}", session_id.0)
    }

    fn access_key(hash: &str) -> String {
        format!("session_access:{hash}")
    }

    fn refresh_key(hash: &str) -> String {
        format!("session_refresh:{hash}")
    }

    fn user_key(user_id: UserId) -> String {
        format!("user_sessions:{}", user_id.0)
    }

    async fn fetch(
        conn: &mut ConnectionManager,
        session_id: SessionId,
    ) -> Result<Option<Session>> {
        let bytes: Option<Vec<u8>> = conn
            .get(Self::session_key(session_id))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("session fetch: {e}")))?;
        match bytes {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes)
                    .map_err(|e| AuthError::SerializationError(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    async fn fetch_by_index(&self, index_key: String) -> Result<Option<Session>> {
        let mut conn = self.conn_manager.clone();
        let session_id: Option<String> = conn
            .get(index_key)
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("session index: {e}")))?;

        let Some(session_id) = session_id else {
            return Ok(None);
        };
        let session_id = session_id
            .parse::<uuid::Uuid>()
            .map(SessionId)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;

        Self::fetch(&mut conn, session_id).await
    }

    async fn delete_session_keys(
        conn: &mut ConnectionManager,
        session: &Session,
    ) -> Result<bool> {
        // The primary key decides the winner under concurrency.
        let removed: i64 = conn
            .del(Self::session_key(session.session_id))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("session del: {e}")))?;

        let _: () = conn
            .del(Self::access_key(&session.access_token_hash))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("access index del: {e}")))?;
        let _: () = conn
            .del(Self::refresh_key(&session.refresh_token_hash))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("refresh index del: {e}")))?;
        let _: () = conn
            .srem(
                Self::user_key(session.user_id),
                session.session_id.0.to_string(),
            )
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("user index del: {e}")))?;

        Ok(removed > 0)
    }
}

impl SessionStore for RedisSessionStore {
    async fn insert(&self, session: &Session) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let bytes = bincode::serialize(session)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;

        #[allow(clippy::cast_sign_loss)]
        let ttl_secs = (session.refresh_expires_at - Utc::now())
            .num_seconds()
            .max(1) as u64;
        let session_id = session.session_id.0.to_string();

        let _: () = conn
            .set_ex(Self::session_key(session.session_id), bytes, ttl_secs)
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("session insert: {e}")))?;
        let _: () = conn
            .set_ex(
                Self::access_key(&session.access_token_hash),
                &session_id,
                ttl_secs,
            )
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("access index: {e}")))?;
        let _: () = conn
            .set_ex(
                Self::refresh_key(&session.refresh_token_hash),
                &session_id,
                ttl_secs,
            )
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("refresh index: {e}")))?;
        let _: () = conn
            .sadd(Self::user_key(session.user_id), &session_id)
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("user index: {e}")))?;

        tracing::debug!(
            session_id = %session.session_id.0,
            user_id = %session.user_id.0,
            "session stored"
        );
        Ok(())
    }

    async fn find_by_access_hash(&self, access_token_hash: &str) -> Result<Option<Session>> {
        self.fetch_by_index(Self::access_key(access_token_hash)).await
    }

    async fn find_by_refresh_hash(&self, refresh_token_hash: &str) -> Result<Option<Session>> {
        self.fetch_by_index(Self::refresh_key(refresh_token_hash)).await
    }

    async fn remove(&self, session_id: SessionId) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let Some(session) = Self::fetch(&mut conn, session_id).await? else {
            return Ok(false);
        };
        Self::delete_session_keys(&mut conn, &session).await
    }

    async fn remove_user_sessions(&self, user_id: UserId) -> Result<u32> {
        let mut conn = self.conn_manager.clone();
        let ids: Vec<String> = conn
            .smembers(Self::user_key(user_id))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("user sessions: {e}")))?;

        let mut removed = 0;
        for id in ids {
            let Ok(parsed) = id.parse::<uuid::Uuid>() else {
                continue;
            };
            if let Some(session) = Self::fetch(&mut conn, SessionId(parsed)).await? {
                if Self::delete_session_keys(&mut conn, &session).await? {
                    removed += 1;
                }
            }
        }

        let _: () = conn
            .del(Self::user_key(user_id))
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("user index del: {e}")))?;

        Ok(removed)
    }
}
