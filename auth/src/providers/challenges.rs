//! Challenge store trait.
//!
//! Challenges are short-lived records tracking in-progress multi-factor
//! verification. Both mutations a challenge can undergo — failure
//! counter increment and satisfied-factor recording — MUST be atomic
//! conditional updates at the storage layer, so two concurrent
//! verification attempts can neither both increment past the failure
//! ceiling nor both complete the challenge and issue two sessions.

use crate::error::Result;
use crate::state::{Challenge, ChallengeId, FactorType};
use chrono::Duration;

/// Challenge store.
///
/// # Concurrency
///
/// - `record_failure` and `record_satisfied` are atomic read-modify-write
///   operations returning the post-update value.
/// - `remove` reports whether this caller deleted the record; with
///   concurrent completions exactly one caller observes `true` and only
///   that caller issues a session.
///
/// Expired challenges are inert: the orchestrator compares the stored
/// expiry against current time on every verification call, so no
/// background timer is required. Stores MAY additionally expire records
/// by TTL as a hygiene measure.
pub trait ChallengeStore: Send + Sync {
    /// Persist a freshly created challenge.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn insert(
        &self,
        challenge: &Challenge,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Fetch a challenge by id.
    ///
    /// # Errors
    ///
    /// Returns error only on storage failure; an unknown id is
    /// `Ok(None)`.
    fn fetch(
        &self,
        challenge_id: ChallengeId,
    ) -> impl std::future::Future<Output = Result<Option<Challenge>>> + Send;

    /// Atomically increment the failure counter.
    ///
    /// # Returns
    ///
    /// The counter value after this increment.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::ChallengeNotFound`] if the challenge
    /// no longer exists.
    fn record_failure(
        &self,
        challenge_id: ChallengeId,
    ) -> impl std::future::Future<Output = Result<u32>> + Send;

    /// Atomically record a satisfied factor type.
    ///
    /// Recording the same type twice is a no-op by construction (the
    /// satisfied collection is a set).
    ///
    /// # Returns
    ///
    /// The number of distinct satisfied factor types after this call.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::ChallengeNotFound`] if the challenge
    /// no longer exists.
    fn record_satisfied(
        &self,
        challenge_id: ChallengeId,
        factor_type: FactorType,
    ) -> impl std::future::Future<Output = Result<u32>> + Send;

    /// Delete a challenge.
    ///
    /// # Returns
    ///
    /// `true` if this caller removed the record, `false` if it was
    /// already gone.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn remove(
        &self,
        challenge_id: ChallengeId,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Store opaque ceremony state (WebAuthn registration/assertion
    /// state) under a caller-chosen key with an expiry.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn put_ceremony(
        &self,
        key: &str,
        state: Vec<u8>,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Atomically take (get and delete) ceremony state.
    ///
    /// Single-use by construction: concurrent takers observe at most one
    /// `Some`.
    ///
    /// # Errors
    ///
    /// Returns error only on storage failure; missing or expired state
    /// is `Ok(None)`.
    fn take_ceremony(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;
}
