//! Error types for authentication and challenge operations.

use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Comprehensive error taxonomy for the MFA orchestration core.
///
/// This enum covers all failure modes in the authentication pipeline,
/// organized by category for clear error handling and user feedback.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Primary Authentication Errors
    // ═══════════════════════════════════════════════════════════

    /// Invalid credentials provided.
    ///
    /// Deliberately generic: never reveals whether the email or the
    /// password was wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Account temporarily locked after repeated failed attempts.
    #[error("Account locked, retry after {retry_after:?}")]
    AccountLocked {
        /// Duration to wait before the lockout lifts.
        retry_after: std::time::Duration,
    },

    // ═══════════════════════════════════════════════════════════
    // Challenge Errors
    // ═══════════════════════════════════════════════════════════

    /// Challenge does not exist (never created, already completed,
    /// or cleaned up). The caller must restart authentication.
    #[error("Challenge not found")]
    ChallengeNotFound,

    /// Challenge expired before the required factors were satisfied.
    /// The caller must restart authentication.
    #[error("Challenge has expired")]
    ChallengeExpired,

    /// The challenge's failed-attempt ceiling was reached and the
    /// challenge has been invalidated. The caller must restart.
    #[error("Maximum verification attempts exceeded")]
    MaxAttemptsExceeded,

    /// Submitted proof did not verify against the factor.
    #[error("Verification failed")]
    InvalidProof,

    // ═══════════════════════════════════════════════════════════
    // Factor Management Errors
    // ═══════════════════════════════════════════════════════════

    /// Factor type is not allowed by policy or not enrolled.
    #[error("Unsupported factor: {factor}")]
    UnsupportedFactor {
        /// Name of the rejected factor type.
        factor: String,
    },

    /// Policy demands MFA but the user has no enrolled factors.
    #[error("Multi-factor enrollment required")]
    EnrollmentRequired,

    /// Removing the user's last enrolled factor while policy
    /// enforcement is `Required` is rejected.
    #[error("Cannot remove the last enrolled factor")]
    LastFactorRemovalDenied,

    /// Password rejected by the strength rule set.
    #[error("Password too weak: {reason}")]
    WeakPassword {
        /// Which rule the password failed.
        reason: String,
    },

    /// Password matches one of the user's recent passwords.
    #[error("Password was used recently")]
    PasswordReuse,

    // ═══════════════════════════════════════════════════════════
    // Session Errors
    // ═══════════════════════════════════════════════════════════

    /// Session not found.
    #[error("Session not found")]
    SessionNotFound,

    /// Session has expired.
    #[error("Session has expired")]
    SessionExpired,

    // ═══════════════════════════════════════════════════════════
    // Rate Limiting
    // ═══════════════════════════════════════════════════════════

    /// Too many attempts against a rate-limited operation.
    #[error("Too many attempts, please retry after {retry_after:?}")]
    RateLimited {
        /// Duration to wait before retrying.
        retry_after: std::time::Duration,
    },

    // ═══════════════════════════════════════════════════════════
    // Collaborator Errors
    // ═══════════════════════════════════════════════════════════

    /// Storage collaborator unavailable. Fatal for the request;
    /// surfaced to the caller as transient, never retried silently.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// One-time code delivery failed. The code is not considered
    /// issued.
    #[error("Failed to deliver one-time code")]
    DeliveryFailure,

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Serialization or deserialization of a stored value failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A cryptographic operation failed (key material, hash parsing).
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// Internal error (should not be exposed to users).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Returns `true` if this error is due to invalid user input.
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::InvalidProof
                | Self::WeakPassword { .. }
                | Self::PasswordReuse
                | Self::UnsupportedFactor { .. }
        )
    }

    /// Returns `true` if this error terminates the active challenge —
    /// the caller must restart authentication from the primary check.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ChallengeNotFound | Self::ChallengeExpired | Self::MaxAttemptsExceeded
        )
    }

    /// Returns `true` if this error indicates a possible attack signal
    /// worth alerting on.
    pub const fn is_security_issue(&self) -> bool {
        matches!(
            self,
            Self::MaxAttemptsExceeded | Self::AccountLocked { .. } | Self::RateLimited { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_credentials_is_user_error() {
        assert!(AuthError::InvalidCredentials.is_user_error());
        assert!(!AuthError::StorageUnavailable("down".into()).is_user_error());
    }

    #[test]
    fn terminal_errors_require_restart() {
        assert!(AuthError::ChallengeNotFound.is_terminal());
        assert!(AuthError::ChallengeExpired.is_terminal());
        assert!(AuthError::MaxAttemptsExceeded.is_terminal());
        assert!(!AuthError::InvalidProof.is_terminal());
    }

    #[test]
    fn lockout_is_security_issue() {
        let err = AuthError::AccountLocked {
            retry_after: std::time::Duration::from_secs(1800),
        };
        assert!(err.is_security_issue());
        assert!(!AuthError::InvalidCredentials.is_security_issue());
    }
}
