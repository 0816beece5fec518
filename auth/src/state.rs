//! Core authentication state types.
//!
//! Identifier newtypes and the durable records the orchestrator moves
//! between: enrolled factors, challenges and sessions. All types are
//! `Clone` and serde-serializable so stores can persist them verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::IpAddr;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Unique identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub uuid::Uuid);

impl UserId {
    /// Generate a new random `UserId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a challenge.
///
/// Challenge ids are uuid v4: opaque and unguessable, so knowing a user
/// id never lets a caller forge a verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChallengeId(pub uuid::Uuid);

impl ChallengeId {
    /// Generate a new random `ChallengeId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ChallengeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    /// Generate a new random `SessionId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for an enrolled factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactorId(pub uuid::Uuid);

impl FactorId {
    /// Generate a new random `FactorId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for FactorId {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Factor Types
// ═══════════════════════════════════════════════════════════════════════

/// Closed set of verification factor types.
///
/// Dispatch across factors is by explicit enum match — extensible at
/// compile time, no open-ended reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorType {
    /// Shared-secret primary credential.
    Password,
    /// Time-based one-time password (RFC 6238).
    Totp,
    /// One-time code delivered over SMS.
    SmsOtp,
    /// One-time code delivered over email.
    EmailOtp,
    /// Hardware/public-key credential (WebAuthn/FIDO2).
    WebAuthn,
    /// Single-use backup recovery code.
    BackupCode,
}

impl FactorType {
    /// Stable string name, used in audit records and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Totp => "totp",
            Self::SmsOtp => "sms_otp",
            Self::EmailOtp => "email_otp",
            Self::WebAuthn => "webauthn",
            Self::BackupCode => "backup_code",
        }
    }

    /// All factor types usable as a second factor.
    #[must_use]
    pub const fn second_factors() -> [Self; 5] {
        [
            Self::Totp,
            Self::SmsOtp,
            Self::EmailOtp,
            Self::WebAuthn,
            Self::BackupCode,
        ]
    }
}

impl std::fmt::Display for FactorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Enrolled Factors
// ═══════════════════════════════════════════════════════════════════════

/// A verification factor the user has enrolled.
///
/// Secret material (TOTP secrets, public keys, destinations) is stored
/// separately by the factor repository; this record is safe to list to
/// the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrolledFactor {
    /// Factor ID.
    pub factor_id: FactorId,

    /// Factor type.
    pub factor_type: FactorType,

    /// User-visible display name (e.g., "Authenticator app").
    pub display_name: String,

    /// Whether this is the user's preferred factor.
    pub primary: bool,

    /// Enrollment timestamp.
    pub created_at: DateTime<Utc>,

    /// Last successful verification timestamp.
    pub last_used_at: Option<DateTime<Utc>>,
}

// ═══════════════════════════════════════════════════════════════════════
// Challenges
// ═══════════════════════════════════════════════════════════════════════

/// A time-bounded record tracking in-progress multi-factor verification
/// for one login attempt.
///
/// A challenge is never mutated except to increment its failure counter
/// and to record which distinct factor types have been satisfied. Both
/// mutations are atomic conditional updates at the store layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    /// Opaque, unguessable challenge ID.
    pub challenge_id: ChallengeId,

    /// Owning user.
    pub user_id: UserId,

    /// IP address the challenge was created from.
    pub ip_address: IpAddr,

    /// User agent the challenge was created from.
    pub user_agent: String,

    /// Number of distinct factor types required to complete.
    pub required_factors: u32,

    /// Factor types the user may satisfy this challenge with.
    pub allowed_factors: BTreeSet<FactorType>,

    /// Distinct factor types verified so far.
    pub satisfied: BTreeSet<FactorType>,

    /// Failed verification attempts so far.
    pub failed_attempts: u32,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Hard expiry deadline, checked on every verification call.
    pub expires_at: DateTime<Utc>,
}

impl Challenge {
    /// Whether the expiry deadline has passed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Distinct factor types still needed at this point.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn remaining_factors(&self) -> u32 {
        self.required_factors
            .saturating_sub(self.satisfied.len() as u32)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════════════════

/// A persisted session record.
///
/// Only token *hashes* are stored; the raw tokens are returned to the
/// caller exactly once inside [`TokenPair`] and never logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub session_id: SessionId,

    /// Owning user.
    pub user_id: UserId,

    /// SHA-256 hash of the access token (base64url).
    pub access_token_hash: String,

    /// SHA-256 hash of the refresh token (base64url).
    pub refresh_token_hash: String,

    /// Device fingerprint bound at issuance.
    pub device_fingerprint: String,

    /// IP address at issuance.
    pub ip_address: IpAddr,

    /// Session creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Access token expiry.
    pub expires_at: DateTime<Utc>,

    /// Refresh token expiry.
    pub refresh_expires_at: DateTime<Utc>,
}

/// Raw token pair handed to the caller at issuance.
///
/// This is the only time the raw tokens exist outside the client; no
/// endpoint can retrieve them again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Opaque bearer access token (base64url, 256 bits).
    pub access_token: String,

    /// Opaque refresh token (base64url, 256 bits).
    pub refresh_token: String,

    /// Access token expiry.
    pub expires_at: DateTime<Utc>,
}

/// Result of session issuance: the persisted record plus the raw pair.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedSession {
    /// The persisted session record (hashes only).
    pub session: Session,

    /// The raw tokens, returned exactly once.
    pub tokens: TokenPair,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn id_generation_is_unique() {
        assert_ne!(UserId::new(), UserId::new());
        assert_ne!(ChallengeId::new(), ChallengeId::new());
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn factor_type_names_are_stable() {
        assert_eq!(FactorType::Totp.as_str(), "totp");
        assert_eq!(FactorType::SmsOtp.as_str(), "sms_otp");
        assert_eq!(FactorType::BackupCode.as_str(), "backup_code");
    }

    #[test]
    fn challenge_remaining_counts_distinct_satisfied() {
        let now = Utc::now();
        let mut challenge = Challenge {
            challenge_id: ChallengeId::new(),
            user_id: UserId::new(),
            ip_address: "203.0.113.7".parse().unwrap(),
            user_agent: "test".into(),
            required_factors: 2,
            allowed_factors: BTreeSet::from([FactorType::Totp, FactorType::BackupCode]),
            satisfied: BTreeSet::new(),
            failed_attempts: 0,
            created_at: now,
            expires_at: now + Duration::minutes(5),
        };

        assert_eq!(challenge.remaining_factors(), 2);
        challenge.satisfied.insert(FactorType::Totp);
        // Same type again does not count twice
        challenge.satisfied.insert(FactorType::Totp);
        assert_eq!(challenge.remaining_factors(), 1);
    }

    #[test]
    fn challenge_expiry_is_a_hard_deadline() {
        let now = Utc::now();
        let challenge = Challenge {
            challenge_id: ChallengeId::new(),
            user_id: UserId::new(),
            ip_address: "203.0.113.7".parse().unwrap(),
            user_agent: "test".into(),
            required_factors: 1,
            allowed_factors: BTreeSet::from([FactorType::Totp]),
            satisfied: BTreeSet::new(),
            failed_attempts: 0,
            created_at: now - Duration::minutes(6),
            expires_at: now - Duration::minutes(1),
        };

        assert!(challenge.is_expired(now));
        assert!(!challenge.is_expired(now - Duration::minutes(2)));
    }
}
