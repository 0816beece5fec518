//! One-time code store trait.
//!
//! A dedicated, typed store for delivered SMS/email codes with real
//! expiry and consumption semantics — deliberately decoupled from the
//! audit trail.

use crate::error::Result;
use crate::state::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery channel for a one-time code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpChannel {
    /// SMS gateway delivery.
    Sms,
    /// Email transport delivery.
    Email,
}

impl OtpChannel {
    /// Stable string name, used in store keys and audit records.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Email => "email",
        }
    }
}

impl std::fmt::Display for OtpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outstanding delivered code.
///
/// Only the salted hash of the code is stored; the raw code exists only
/// in the delivery message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneTimeCode {
    /// Owning user.
    pub user_id: UserId,

    /// Channel the code was delivered over.
    pub channel: OtpChannel,

    /// Salted SHA-256 hash of the code.
    pub code_hash: String,

    /// Issuance timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiry timestamp (minutes after issuance).
    pub expires_at: DateTime<Utc>,
}

/// One-time code store.
///
/// At most one outstanding code per (user, channel): issuing a new code
/// replaces the previous one. Consumption is atomic and unconditional —
/// verification takes the code out of the store first and compares
/// afterwards, so success and failure both invalidate it and two
/// concurrent submissions observe at most one code.
pub trait OneTimeCodeStore: Send + Sync {
    /// Store a code, replacing any outstanding code for the same
    /// (user, channel).
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn put(
        &self,
        code: &OneTimeCode,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Atomically remove and return the outstanding code.
    ///
    /// # Errors
    ///
    /// Returns error only on storage failure; no outstanding code is
    /// `Ok(None)`.
    fn take(
        &self,
        user_id: UserId,
        channel: OtpChannel,
    ) -> impl std::future::Future<Output = Result<Option<OneTimeCode>>> + Send;
}
