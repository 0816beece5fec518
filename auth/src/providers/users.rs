//! User repository trait.

use crate::error::Result;
use crate::policy::MfaPolicy;
use crate::state::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable user account record as the orchestrator sees it.
///
/// The password hash is an argon2id PHC string; the raw password never
/// reaches storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User ID.
    pub user_id: UserId,

    /// Email address (unique).
    pub email: String,

    /// Argon2id hash of the current password.
    pub password_hash: String,

    /// User-level MFA policy.
    pub policy: MfaPolicy,

    /// Organization-level MFA policy applying to this user.
    pub org_policy: MfaPolicy,

    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// User repository.
///
/// This trait abstracts over durable user storage. Lookups by email are
/// used pre-authentication; the orchestrator must not leak whether a
/// lookup failed versus a password mismatch.
pub trait UserRepository: Send + Sync {
    /// Find a user by email.
    ///
    /// # Errors
    ///
    /// Returns error only on storage failure; an unknown email is
    /// `Ok(None)`.
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<UserRecord>>> + Send;

    /// Find a user by id.
    ///
    /// # Errors
    ///
    /// Returns error only on storage failure.
    fn find_by_id(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<Option<UserRecord>>> + Send;

    /// Most recent password hashes, newest first, including the current
    /// one. Used for reuse prevention.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn password_history(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;

    /// Replace the current password hash, pushing the previous one onto
    /// the history.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn update_password(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
