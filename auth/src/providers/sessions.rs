//! Session store trait.

use crate::error::Result;
use crate::state::{Session, SessionId, UserId};

/// Session store.
///
/// Sessions are looked up by token *hash*; raw tokens never reach the
/// store. No operation returns a raw token — once issued, a token
/// cannot be retrieved from the server again.
pub trait SessionStore: Send + Sync {
    /// Persist a session record.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn insert(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Find a session by access token hash.
    ///
    /// # Errors
    ///
    /// Returns error only on storage failure.
    fn find_by_access_hash(
        &self,
        access_token_hash: &str,
    ) -> impl std::future::Future<Output = Result<Option<Session>>> + Send;

    /// Find a session by refresh token hash.
    ///
    /// # Errors
    ///
    /// Returns error only on storage failure.
    fn find_by_refresh_hash(
        &self,
        refresh_token_hash: &str,
    ) -> impl std::future::Future<Output = Result<Option<Session>>> + Send;

    /// Delete a session.
    ///
    /// # Returns
    ///
    /// `true` if this caller removed the record — refresh rotation uses
    /// this to guarantee a refresh token is honored at most once.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn remove(
        &self,
        session_id: SessionId,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Delete all sessions for a user (credential compromise response).
    ///
    /// # Returns
    ///
    /// Number of sessions removed.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn remove_user_sessions(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<u32>> + Send;
}
