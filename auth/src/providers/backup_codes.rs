//! Backup code store trait.

use crate::error::Result;
use crate::state::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored backup code: salted hash plus consumption state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupCodeRecord {
    /// Record id, used for atomic consumption.
    pub code_id: uuid::Uuid,

    /// Owning user.
    pub user_id: UserId,

    /// Salted SHA-256 hash of the code (`salt.digest`, base64url).
    pub code_hash: String,

    /// Whether the code has been consumed.
    pub used: bool,

    /// Batch creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Consumption timestamp.
    pub used_at: Option<DateTime<Utc>>,
}

/// Backup code store.
///
/// Batches are atomic and non-overlapping in time: `replace_batch`
/// deletes every previously unused code before inserting the new batch.
/// Consumption is an atomic test-and-set on the `used` flag — two
/// concurrent submissions of the same code result in exactly one
/// success.
pub trait BackupCodeStore: Send + Sync {
    /// Atomically delete all unused codes for the user and insert a
    /// fresh batch.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn replace_batch(
        &self,
        user_id: UserId,
        batch: Vec<BackupCodeRecord>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// All unused codes for the user.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn unused(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<Vec<BackupCodeRecord>>> + Send;

    /// Atomically mark a code used.
    ///
    /// # Returns
    ///
    /// `true` if this call flipped the flag; `false` if the code was
    /// already used or no longer exists.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn consume(
        &self,
        user_id: UserId,
        code_id: uuid::Uuid,
        used_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Count of unused codes, for the low-remaining signal.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn count_unused(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<u32>> + Send;
}
