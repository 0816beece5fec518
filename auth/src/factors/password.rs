//! Password factor: hashing, strength rules, history and lockout.

use crate::config::PasswordConfig;
use crate::constants::COMMON_PASSWORDS;
use crate::error::{AuthError, Result};
use crate::providers::{RateLimiter, UserRepository};
use crate::state::UserId;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Password verifier and policy enforcement.
///
/// Hashes are argon2id PHC strings. Failed logins are rate-limited per
/// account: once the failure ceiling inside the rolling window is hit,
/// the account locks for a fixed duration regardless of the
/// correctness of subsequent attempts.
#[derive(Clone)]
pub struct PasswordFactor<U, RL>
where
    U: UserRepository + Clone,
    RL: RateLimiter + Clone,
{
    users: U,
    rate_limiter: RL,
    config: PasswordConfig,
}

impl<U, RL> PasswordFactor<U, RL>
where
    U: UserRepository + Clone,
    RL: RateLimiter + Clone,
{
    /// Create a password factor over the given collaborators.
    pub const fn new(users: U, rate_limiter: RL, config: PasswordConfig) -> Self {
        Self {
            users,
            rate_limiter,
            config,
        }
    }

    /// Rate-limit key for an account's failed primary attempts.
    fn lockout_key(email: &str) -> String {
        format!("login:{}", email.to_lowercase())
    }

    /// Hash a password for storage.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CryptoError`] if hashing fails.
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::CryptoError(format!("password hash failed: {e}")))
    }

    /// Verify a password against a stored hash.
    ///
    /// Argon2 verification is inherently constant-time with respect to
    /// the candidate password.
    #[must_use]
    pub fn verify_hash(password: &str, stored: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Check the lockout state for an account.
    ///
    /// Called before the hash comparison so a locked account rejects
    /// correct and incorrect passwords alike.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AccountLocked`] while the failure ceiling
    /// within the rolling window is reached.
    pub async fn ensure_not_locked(&self, email: &str) -> Result<()> {
        let failures = self
            .rate_limiter
            .attempts(&Self::lockout_key(email), self.config.lockout_window)
            .await?;
        if failures >= self.config.max_failures {
            return Err(AuthError::AccountLocked {
                retry_after: self.config.lockout_duration,
            });
        }
        Ok(())
    }

    /// Record one failed primary attempt toward the lockout ceiling.
    ///
    /// Successful logins never count; they clear the counter instead.
    ///
    /// # Errors
    ///
    /// Returns error if the rate limiter's store fails.
    pub async fn record_failure(&self, email: &str) -> Result<()> {
        match self
            .rate_limiter
            .check_and_record(
                &Self::lockout_key(email),
                self.config.max_failures,
                self.config.lockout_window,
            )
            .await
        {
            // Already at the ceiling: the lock is in force either way.
            Ok(()) | Err(AuthError::RateLimited { .. }) => Ok(()),
            Err(other) => Err(other),
        }
    }

    /// Clear the failure counter after a successful login.
    ///
    /// # Errors
    ///
    /// Returns error if the rate limiter's store fails.
    pub async fn clear_failures(&self, email: &str) -> Result<()> {
        self.rate_limiter.reset(&Self::lockout_key(email)).await
    }

    /// Validate a candidate password against the strength rule set and
    /// the account's password history, then hash it.
    ///
    /// # Errors
    ///
    /// - [`AuthError::WeakPassword`] for rule violations
    /// - [`AuthError::PasswordReuse`] when the candidate matches one of
    ///   the last N hashes
    pub async fn prepare_new_password(
        &self,
        user_id: UserId,
        email: &str,
        password: &str,
    ) -> Result<String> {
        self.validate_strength(email, password)?;

        let history = self
            .users
            .password_history(user_id, self.config.history_depth)
            .await?;
        for old_hash in &history {
            if Self::verify_hash(password, old_hash) {
                return Err(AuthError::PasswordReuse);
            }
        }

        self.hash(password)
    }

    /// Strength rules: length, character classes, deny list, and no
    /// email local part.
    fn validate_strength(&self, email: &str, password: &str) -> Result<()> {
        if password.chars().count() < self.config.min_length {
            return Err(AuthError::WeakPassword {
                reason: format!("must be at least {} characters", self.config.min_length),
            });
        }

        if self.config.require_character_classes {
            let has_upper = password.chars().any(char::is_uppercase);
            let has_lower = password.chars().any(char::is_lowercase);
            let has_digit = password.chars().any(|c| c.is_ascii_digit());
            let has_symbol = password.chars().any(|c| !c.is_alphanumeric());
            if !(has_upper && has_lower && has_digit && has_symbol) {
                return Err(AuthError::WeakPassword {
                    reason: "must mix upper, lower, digit and symbol characters".into(),
                });
            }
        }

        let lowered = password.to_lowercase();
        if COMMON_PASSWORDS.contains(&lowered.as_str()) {
            return Err(AuthError::WeakPassword {
                reason: "too common".into(),
            });
        }

        if let Some((local, _)) = email.split_once('@') {
            if local.len() >= 3 && lowered.contains(&local.to_lowercase()) {
                return Err(AuthError::WeakPassword {
                    reason: "must not contain your email address".into(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mocks::{MockRateLimiter, MockUserRepository};

    fn factor() -> PasswordFactor<MockUserRepository, MockRateLimiter> {
        PasswordFactor::new(
            MockUserRepository::new(),
            MockRateLimiter::new(),
            PasswordConfig::default(),
        )
    }

    #[tokio::test]
    async fn hash_and_verify_round_trip() {
        let factor = factor();
        let hash = factor.hash("Tr0ub4dour&horse!").unwrap();
        assert!(PasswordFactor::<MockUserRepository, MockRateLimiter>::verify_hash(
            "Tr0ub4dour&horse!",
            &hash
        ));
        assert!(!PasswordFactor::<MockUserRepository, MockRateLimiter>::verify_hash(
            "wrong password",
            &hash
        ));
    }

    #[tokio::test]
    async fn hashes_are_salted() {
        let factor = factor();
        let a = factor.hash("Tr0ub4dour&horse!").unwrap();
        let b = factor.hash("Tr0ub4dour&horse!").unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let err = factor()
            .prepare_new_password(UserId::new(), "user@example.com", "Sh0rt!")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword { .. }));
    }

    #[tokio::test]
    async fn missing_character_class_is_rejected() {
        let err = factor()
            .prepare_new_password(UserId::new(), "user@example.com", "alllowercaseonly")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword { .. }));
    }

    #[tokio::test]
    async fn common_password_is_rejected() {
        let mut config = PasswordConfig::default();
        config.min_length = 6;
        config.require_character_classes = false;
        let factor = PasswordFactor::new(MockUserRepository::new(), MockRateLimiter::new(), config);

        let err = factor
            .prepare_new_password(UserId::new(), "user@example.com", "Password123")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword { .. }));
    }

    #[tokio::test]
    async fn password_containing_email_local_part_is_rejected() {
        let err = factor()
            .prepare_new_password(UserId::new(), "melissa@example.com", "Melissa#2026!xyz")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword { .. }));
    }

    #[tokio::test]
    async fn lockout_trips_after_failure_ceiling() {
        let factor = factor();
        for _ in 0..factor.config.max_failures {
            factor.ensure_not_locked("user@example.com").await.unwrap();
            factor.record_failure("user@example.com").await.unwrap();
        }
        let err = factor
            .ensure_not_locked("user@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountLocked { .. }));

        // Further failures while locked are absorbed, not errors
        factor.record_failure("user@example.com").await.unwrap();
    }

    #[tokio::test]
    async fn clearing_failures_lifts_the_lock() {
        let factor = factor();
        for _ in 0..factor.config.max_failures {
            factor.record_failure("user@example.com").await.unwrap();
        }
        factor.clear_failures("user@example.com").await.unwrap();
        assert!(factor.ensure_not_locked("user@example.com").await.is_ok());
    }
}
