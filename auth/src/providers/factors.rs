//! Enrolled factor repository trait.

use crate::error::Result;
use crate::state::{EnrolledFactor, FactorId, FactorType, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Secret material backing an enrolled factor.
///
/// Stored alongside the [`EnrolledFactor`] record but never listed back
/// to clients. TOTP secrets are sealed (AES-256-GCM) before they reach
/// this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FactorMaterial {
    /// Sealed TOTP secret (base64 of nonce || ciphertext).
    TotpSecret {
        /// Encrypted secret.
        sealed: String,
    },

    /// Destination phone number for SMS codes (E.164).
    Phone {
        /// Destination number.
        number: String,
    },

    /// Destination address for email codes.
    Email {
        /// Destination address.
        address: String,
    },

    /// WebAuthn credential: id, COSE public key reference and
    /// anti-replay counter.
    WebAuthn {
        /// Serialized passkey credential (JSON).
        credential: serde_json::Value,

        /// Credential id (base64url).
        credential_id: String,

        /// Last seen signature counter.
        counter: u32,
    },

    /// Backup codes carry no per-factor material; the batch lives in the
    /// backup code store.
    BackupCodes,
}

/// Enrolled factor repository.
///
/// Owns both the listable [`EnrolledFactor`] records and their secret
/// material. One enrollment per factor type per user; re-enrollment
/// replaces the previous material.
pub trait FactorRepository: Send + Sync {
    /// List the user's enrolled factors (no secret material).
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn list(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<Vec<EnrolledFactor>>> + Send;

    /// Persist a new enrollment with its material, replacing any
    /// existing enrollment of the same type.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn insert(
        &self,
        user_id: UserId,
        factor: &EnrolledFactor,
        material: &FactorMaterial,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Fetch the material for the user's enrollment of `factor_type`.
    ///
    /// # Errors
    ///
    /// Returns error only on storage failure; no enrollment is
    /// `Ok(None)`.
    fn material(
        &self,
        user_id: UserId,
        factor_type: FactorType,
    ) -> impl std::future::Future<Output = Result<Option<(FactorId, FactorMaterial)>>> + Send;

    /// Remove an enrollment by id.
    ///
    /// # Returns
    ///
    /// `true` if a record was removed.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn remove(
        &self,
        user_id: UserId,
        factor_id: FactorId,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Record a successful verification timestamp.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn touch(
        &self,
        user_id: UserId,
        factor_id: FactorId,
        used_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Update the stored WebAuthn signature counter.
    ///
    /// The new value must be greater than the stored one; the verifier
    /// rejects regressions before calling this.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn update_counter(
        &self,
        user_id: UserId,
        factor_id: FactorId,
        counter: u32,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
