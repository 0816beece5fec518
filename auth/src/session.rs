//! Session issuance and revocation.
//!
//! Two independent 256-bit tokens per session (access, refresh), drawn
//! from the OS CSPRNG. Only their SHA-256 hashes are persisted, bound
//! to a device fingerprint and explicit expiries. The raw pair is
//! returned exactly once; no endpoint can retrieve it again.

use crate::config::SessionConfig;
use crate::context::AuthContext;
use crate::crypto::{random_token, token_hash};
use crate::error::{AuthError, Result};
use crate::fingerprint::device_fingerprint;
use crate::providers::SessionStore;
use crate::state::{IssuedSession, Session, SessionId, TokenPair, UserId};
use chrono::Utc;

/// Session issuer.
#[derive(Clone)]
pub struct SessionIssuer<S>
where
    S: SessionStore + Clone,
{
    sessions: S,
    config: SessionConfig,
}

impl<S> SessionIssuer<S>
where
    S: SessionStore + Clone,
{
    /// Create an issuer over the given store.
    pub const fn new(sessions: S, config: SessionConfig) -> Self {
        Self { sessions, config }
    }

    /// Issue a fresh session for a fully authenticated user.
    ///
    /// # Errors
    ///
    /// Returns error if the session store fails.
    pub async fn issue(&self, user_id: UserId, ctx: &AuthContext) -> Result<IssuedSession> {
        let access_token = random_token();
        let refresh_token = random_token();
        let now = Utc::now();

        let session = Session {
            session_id: SessionId::new(),
            user_id,
            access_token_hash: token_hash(&access_token),
            refresh_token_hash: token_hash(&refresh_token),
            device_fingerprint: device_fingerprint(&ctx.device, &ctx.user_agent),
            ip_address: ctx.ip_address,
            created_at: now,
            expires_at: now + self.config.access_ttl,
            refresh_expires_at: now + self.config.refresh_ttl,
        };

        self.sessions.insert(&session).await?;

        tracing::info!(
            user_id = %user_id.0,
            session_id = %session.session_id.0,
            "session issued"
        );

        Ok(IssuedSession {
            tokens: TokenPair {
                access_token,
                refresh_token,
                expires_at: session.expires_at,
            },
            session,
        })
    }

    /// Rotate a session: a valid refresh token yields a new pair and
    /// revokes the old record.
    ///
    /// The removal is the atomicity point — of two concurrent rotations
    /// with the same token, exactly one observes the record and wins.
    ///
    /// # Errors
    ///
    /// - [`AuthError::SessionNotFound`] for unknown or already rotated
    ///   tokens
    /// - [`AuthError::SessionExpired`] past the refresh deadline
    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedSession> {
        let old = self
            .sessions
            .find_by_refresh_hash(&token_hash(refresh_token))
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        let now = Utc::now();
        if now >= old.refresh_expires_at {
            // Hygiene: drop the dead record; the outcome stands either way.
            let _ = self.sessions.remove(old.session_id).await;
            return Err(AuthError::SessionExpired);
        }

        if !self.sessions.remove(old.session_id).await? {
            return Err(AuthError::SessionNotFound);
        }

        let access_token = random_token();
        let new_refresh_token = random_token();
        let session = Session {
            session_id: SessionId::new(),
            user_id: old.user_id,
            access_token_hash: token_hash(&access_token),
            refresh_token_hash: token_hash(&new_refresh_token),
            device_fingerprint: old.device_fingerprint.clone(),
            ip_address: old.ip_address,
            created_at: now,
            expires_at: now + self.config.access_ttl,
            refresh_expires_at: now + self.config.refresh_ttl,
        };
        self.sessions.insert(&session).await?;

        tracing::info!(
            user_id = %old.user_id.0,
            old_session = %old.session_id.0,
            new_session = %session.session_id.0,
            "session rotated"
        );

        Ok(IssuedSession {
            tokens: TokenPair {
                access_token,
                refresh_token: new_refresh_token,
                expires_at: session.expires_at,
            },
            session,
        })
    }

    /// Revoke the session behind an access token (logout).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SessionNotFound`] for unknown tokens.
    pub async fn revoke_by_access(&self, access_token: &str) -> Result<SessionId> {
        let session = self
            .sessions
            .find_by_access_hash(&token_hash(access_token))
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        self.sessions.remove(session.session_id).await?;
        tracing::info!(session_id = %session.session_id.0, "session revoked");
        Ok(session.session_id)
    }

    /// Revoke every session for a user (compromise response).
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn revoke_all(&self, user_id: UserId) -> Result<u32> {
        let removed = self.sessions.remove_user_sessions(user_id).await?;
        tracing::info!(user_id = %user_id.0, removed, "all sessions revoked");
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::context::DeviceDescriptor;
    use crate::mocks::MockSessionStore;

    fn issuer() -> SessionIssuer<MockSessionStore> {
        SessionIssuer::new(MockSessionStore::new(), SessionConfig::default())
    }

    fn ctx() -> AuthContext {
        AuthContext::new(
            "198.51.100.4".parse().unwrap(),
            "Mozilla/5.0",
            DeviceDescriptor::default(),
        )
    }

    #[tokio::test]
    async fn issued_session_stores_only_hashes() {
        let issuer = issuer();
        let issued = issuer.issue(UserId::new(), &ctx()).await.unwrap();

        assert_ne!(issued.session.access_token_hash, issued.tokens.access_token);
        assert_ne!(
            issued.session.refresh_token_hash,
            issued.tokens.refresh_token
        );
        assert_eq!(
            issued.session.access_token_hash,
            token_hash(&issued.tokens.access_token)
        );
    }

    #[tokio::test]
    async fn access_and_refresh_tokens_are_independent() {
        let issued = issuer().issue(UserId::new(), &ctx()).await.unwrap();
        assert_ne!(issued.tokens.access_token, issued.tokens.refresh_token);
    }

    #[tokio::test]
    async fn refresh_rotates_and_revokes_the_old_session() {
        let issuer = issuer();
        let first = issuer.issue(UserId::new(), &ctx()).await.unwrap();

        let second = issuer.refresh(&first.tokens.refresh_token).await.unwrap();
        assert_ne!(first.session.session_id, second.session.session_id);

        // The old refresh token is dead
        let err = issuer.refresh(&first.tokens.refresh_token).await.unwrap_err();
        assert_eq!(err, AuthError::SessionNotFound);
    }

    #[tokio::test]
    async fn logout_revokes_by_access_token() {
        let issuer = issuer();
        let issued = issuer.issue(UserId::new(), &ctx()).await.unwrap();

        issuer
            .revoke_by_access(&issued.tokens.access_token)
            .await
            .unwrap();
        let err = issuer
            .revoke_by_access(&issued.tokens.access_token)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::SessionNotFound);
    }

    #[tokio::test]
    async fn revoke_all_clears_every_session() {
        let issuer = issuer();
        let user_id = UserId::new();
        issuer.issue(user_id, &ctx()).await.unwrap();
        issuer.issue(user_id, &ctx()).await.unwrap();

        assert_eq!(issuer.revoke_all(user_id).await.unwrap(), 2);
    }
}
