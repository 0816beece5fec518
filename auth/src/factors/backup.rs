//! Backup/recovery code factor.
//!
//! Batches of high-entropy single-use codes from a reduced,
//! ambiguity-free alphabet, shown once and stored as salted one-way
//! hashes. Verification scans *all* unused hashes in constant time per
//! comparison and never short-circuits, then consumes the match with an
//! atomic test-and-set.

use crate::config::BackupCodeConfig;
use crate::constants::BACKUP_CODE_ALPHABET;
use crate::crypto;
use crate::error::{AuthError, Result};
use crate::providers::{BackupCodeRecord, BackupCodeStore};
use crate::state::UserId;
use chrono::{DateTime, Utc};

/// Backup code generator/verifier.
#[derive(Clone)]
pub struct BackupCodeFactor<B>
where
    B: BackupCodeStore + Clone,
{
    store: B,
    config: BackupCodeConfig,
}

impl<B> BackupCodeFactor<B>
where
    B: BackupCodeStore + Clone,
{
    /// Create the factor over its store.
    pub const fn new(store: B, config: BackupCodeConfig) -> Self {
        Self { store, config }
    }

    /// Generate a fresh batch, invalidating every previously unused
    /// code for the user.
    ///
    /// # Returns
    ///
    /// The raw codes — the only time they exist outside the client.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails; the old batch stays intact in
    /// that case (replacement is atomic).
    pub async fn generate_batch(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let mut raw = Vec::with_capacity(self.config.batch_size);
        let mut records = Vec::with_capacity(self.config.batch_size);

        for _ in 0..self.config.batch_size {
            let code =
                crypto::random_code_from_alphabet(self.config.code_length, BACKUP_CODE_ALPHABET);
            let salt = crypto::random_salt();
            records.push(BackupCodeRecord {
                code_id: uuid::Uuid::new_v4(),
                user_id,
                code_hash: crypto::salted_code_hash(&code, &salt),
                used: false,
                created_at: now,
                used_at: None,
            });
            raw.push(code);
        }

        self.store.replace_batch(user_id, records).await?;
        tracing::info!(user_id = %user_id.0, count = raw.len(), "backup code batch regenerated");
        Ok(raw)
    }

    /// Verify a submitted code against all unused codes.
    ///
    /// # Returns
    ///
    /// The number of unused codes remaining after consumption.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidProof`] if no unused code matches, or the
    /// matching code was consumed concurrently (exactly one of two
    /// simultaneous submissions succeeds).
    pub async fn verify(
        &self,
        user_id: UserId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<u32> {
        let unused = self.store.unused(user_id).await?;

        // Scan every candidate; no early exit, so timing does not leak
        // which position (if any) matched.
        let mut matched: Option<uuid::Uuid> = None;
        for record in &unused {
            if crypto::verify_salted_code(code, &record.code_hash) && matched.is_none() {
                matched = Some(record.code_id);
            }
        }

        let Some(code_id) = matched else {
            return Err(AuthError::InvalidProof);
        };

        // Test-and-set: the used flag flips before success is reported,
        // closing the window for concurrent reuse.
        if !self.store.consume(user_id, code_id, now).await? {
            return Err(AuthError::InvalidProof);
        }

        let remaining = self.store.count_unused(user_id).await?;
        if remaining <= self.config.low_remaining_threshold {
            tracing::warn!(
                user_id = %user_id.0,
                remaining,
                "backup codes running low"
            );
        }
        Ok(remaining)
    }

    /// Whether `remaining` is at or below the low-codes threshold.
    #[must_use]
    pub const fn is_low(&self, remaining: u32) -> bool {
        remaining <= self.config.low_remaining_threshold
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mocks::MockBackupCodeStore;
    use std::sync::Arc;

    fn factor() -> BackupCodeFactor<MockBackupCodeStore> {
        BackupCodeFactor::new(MockBackupCodeStore::new(), BackupCodeConfig::default())
    }

    #[tokio::test]
    async fn batch_has_configured_size_and_alphabet() {
        let factor = factor();
        let codes = factor.generate_batch(UserId::new(), Utc::now()).await.unwrap();

        assert_eq!(codes.len(), 10);
        for code in &codes {
            assert_eq!(code.len(), 10);
            assert!(code.bytes().all(|b| BACKUP_CODE_ALPHABET.contains(&b)));
        }
    }

    #[tokio::test]
    async fn first_use_succeeds_second_fails() {
        let factor = factor();
        let user_id = UserId::new();
        let codes = factor.generate_batch(user_id, Utc::now()).await.unwrap();

        assert!(factor.verify(user_id, &codes[0], Utc::now()).await.is_ok());
        let err = factor.verify(user_id, &codes[0], Utc::now()).await.unwrap_err();
        assert_eq!(err, AuthError::InvalidProof);
    }

    #[tokio::test]
    async fn regeneration_invalidates_prior_batch() {
        let factor = factor();
        let user_id = UserId::new();
        let old = factor.generate_batch(user_id, Utc::now()).await.unwrap();

        // Burn seven, leaving three unused from the first batch
        for code in &old[..7] {
            factor.verify(user_id, code, Utc::now()).await.unwrap();
        }
        assert_eq!(factor.store.count_unused(user_id).await.unwrap(), 3);

        // A fresh batch leaves exactly ten valid codes total
        let fresh = factor.generate_batch(user_id, Utc::now()).await.unwrap();
        assert_eq!(factor.store.count_unused(user_id).await.unwrap(), 10);

        // All three surviving prior codes are dead
        for code in &old[7..] {
            let err = factor.verify(user_id, code, Utc::now()).await.unwrap_err();
            assert_eq!(err, AuthError::InvalidProof);
        }
        assert!(factor.verify(user_id, &fresh[0], Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn remaining_count_decrements_and_flags_low() {
        let factor = factor();
        let user_id = UserId::new();
        let codes = factor.generate_batch(user_id, Utc::now()).await.unwrap();

        let mut remaining = codes.len() as u32;
        for code in &codes[..8] {
            remaining = factor.verify(user_id, code, Utc::now()).await.unwrap();
        }
        assert_eq!(remaining, 2);
        assert!(factor.is_low(remaining));
    }

    #[tokio::test]
    async fn concurrent_submissions_of_one_code_yield_one_success() {
        let factor = Arc::new(factor());
        let user_id = UserId::new();
        let codes = factor.generate_batch(user_id, Utc::now()).await.unwrap();
        let code = codes[0].clone();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let factor = Arc::clone(&factor);
            let code = code.clone();
            handles.push(tokio::spawn(async move {
                factor.verify(user_id, &code, Utc::now()).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1, "test-and-set must admit exactly one consumer");
    }
}
