//! Delivered one-time code factor (SMS and email channels).
//!
//! Codes are short-lived, rate-limited per destination, and stored only
//! as salted hashes in the dedicated one-time-code store. The send
//! happens *before* the store write: a delivery failure means the code
//! was never issued, so no dangling usable code can exist. Verification
//! takes the outstanding code atomically — success and failure both
//! invalidate it.

use crate::config::OtpConfig;
use crate::crypto;
use crate::error::{AuthError, Result};
use crate::providers::{
    EmailProvider, FactorMaterial, FactorRepository, OneTimeCode, OneTimeCodeStore, OtpChannel,
    RateLimiter, SmsProvider,
};
use crate::state::{FactorId, FactorType, UserId};
use chrono::{DateTime, Utc};

/// One-time code sender/verifier over both delivery channels.
#[derive(Clone)]
pub struct OtpFactor<C, S, E, RL, F>
where
    C: OneTimeCodeStore + Clone,
    S: SmsProvider + Clone,
    E: EmailProvider + Clone,
    RL: RateLimiter + Clone,
    F: FactorRepository + Clone,
{
    codes: C,
    sms: S,
    email: E,
    rate_limiter: RL,
    factors: F,
    config: OtpConfig,
}

impl<C, S, E, RL, F> OtpFactor<C, S, E, RL, F>
where
    C: OneTimeCodeStore + Clone,
    S: SmsProvider + Clone,
    E: EmailProvider + Clone,
    RL: RateLimiter + Clone,
    F: FactorRepository + Clone,
{
    /// Create the factor over its collaborators.
    pub const fn new(
        codes: C,
        sms: S,
        email: E,
        rate_limiter: RL,
        factors: F,
        config: OtpConfig,
    ) -> Self {
        Self {
            codes,
            sms,
            email,
            rate_limiter,
            factors,
            config,
        }
    }

    const fn factor_type(channel: OtpChannel) -> FactorType {
        match channel {
            OtpChannel::Sms => FactorType::SmsOtp,
            OtpChannel::Email => FactorType::EmailOtp,
        }
    }

    fn send_key(user_id: UserId, channel: OtpChannel) -> String {
        format!("otp:{}:{}", user_id.0, channel)
    }

    /// Generate and deliver a fresh code, replacing any outstanding one.
    ///
    /// # Errors
    ///
    /// - [`AuthError::UnsupportedFactor`] if the channel is not enrolled
    /// - [`AuthError::RateLimited`] when the hourly send budget is spent
    /// - [`AuthError::DeliveryFailure`] if the transport fails; the code
    ///   is not issued in that case
    pub async fn send(&self, user_id: UserId, channel: OtpChannel, now: DateTime<Utc>) -> Result<()> {
        let Some((_, material)) = self
            .factors
            .material(user_id, Self::factor_type(channel))
            .await?
        else {
            return Err(AuthError::UnsupportedFactor {
                factor: Self::factor_type(channel).as_str().into(),
            });
        };

        self.rate_limiter
            .check_and_record(
                &Self::send_key(user_id, channel),
                self.config.max_sends_per_hour,
                std::time::Duration::from_secs(3600),
            )
            .await?;

        let code = crypto::random_numeric_code(self.config.digits);
        let expires_at = now + self.config.ttl;
        let minutes = self.config.ttl.num_minutes();
        let message =
            format!("Your verification code is {code}. It expires in {minutes} minutes.");

        // Deliver first: a failed send must never leave a usable code.
        match (channel, &material) {
            (OtpChannel::Sms, FactorMaterial::Phone { number }) => {
                self.sms.send(number, &message).await?;
            }
            (OtpChannel::Email, FactorMaterial::Email { address }) => {
                self.email.send_one_time_code(address, &code, expires_at).await?;
            }
            _ => {
                return Err(AuthError::InternalError(
                    "one-time code enrollment has mismatched material".into(),
                ));
            }
        }

        let salt = crypto::random_salt();
        let record = OneTimeCode {
            user_id,
            channel,
            code_hash: crypto::salted_code_hash(&code, &salt),
            issued_at: now,
            expires_at,
        };
        self.codes.put(&record).await?;

        tracing::info!(user_id = %user_id.0, %channel, "one-time code issued");
        Ok(())
    }

    /// Verify a submitted code, consuming the outstanding one.
    ///
    /// # Returns
    ///
    /// The enrolled factor id on success.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidProof`] when no outstanding code exists, the
    /// code expired, or it does not match. In every case the
    /// outstanding code is gone afterwards.
    pub async fn verify(
        &self,
        user_id: UserId,
        channel: OtpChannel,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<FactorId> {
        // Atomic take: concurrent submissions observe at most one code,
        // and a failed match still invalidates it.
        let Some(outstanding) = self.codes.take(user_id, channel).await? else {
            return Err(AuthError::InvalidProof);
        };

        if now >= outstanding.expires_at {
            tracing::debug!(user_id = %user_id.0, %channel, "one-time code expired");
            return Err(AuthError::InvalidProof);
        }

        if !crypto::verify_salted_code(code, &outstanding.code_hash) {
            return Err(AuthError::InvalidProof);
        }

        let Some((factor_id, _)) = self
            .factors
            .material(user_id, Self::factor_type(channel))
            .await?
        else {
            return Err(AuthError::UnsupportedFactor {
                factor: Self::factor_type(channel).as_str().into(),
            });
        };

        Ok(factor_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mocks::{
        MockEmailProvider, MockFactorRepository, MockOneTimeCodeStore, MockRateLimiter,
        MockSmsProvider,
    };
    use crate::state::EnrolledFactor;

    fn factor() -> (
        OtpFactor<
            MockOneTimeCodeStore,
            MockSmsProvider,
            MockEmailProvider,
            MockRateLimiter,
            MockFactorRepository,
        >,
        MockSmsProvider,
        MockFactorRepository,
    ) {
        let sms = MockSmsProvider::new();
        let factors = MockFactorRepository::new();
        let otp = OtpFactor::new(
            MockOneTimeCodeStore::new(),
            sms.clone(),
            MockEmailProvider::new(),
            MockRateLimiter::new(),
            factors.clone(),
            OtpConfig::default(),
        );
        (otp, sms, factors)
    }

    async fn enroll_sms(factors: &MockFactorRepository, user_id: UserId) {
        let record = EnrolledFactor {
            factor_id: FactorId::new(),
            factor_type: FactorType::SmsOtp,
            display_name: "Phone".into(),
            primary: false,
            created_at: Utc::now(),
            last_used_at: None,
        };
        factors
            .insert(
                user_id,
                &record,
                &FactorMaterial::Phone {
                    number: "+33612345678".into(),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delivered_code_verifies_once() {
        let (otp, sms, factors) = factor();
        let user_id = UserId::new();
        enroll_sms(&factors, user_id).await;

        let now = Utc::now();
        otp.send(user_id, OtpChannel::Sms, now).await.unwrap();
        let code = sms.last_code().expect("code was sent");

        assert!(otp.verify(user_id, OtpChannel::Sms, &code, now).await.is_ok());
        // Consumed: the same code fails immediately after
        let err = otp
            .verify(user_id, OtpChannel::Sms, &code, now)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidProof);
    }

    #[tokio::test]
    async fn wrong_code_also_consumes_the_outstanding_one() {
        let (otp, sms, factors) = factor();
        let user_id = UserId::new();
        enroll_sms(&factors, user_id).await;

        let now = Utc::now();
        otp.send(user_id, OtpChannel::Sms, now).await.unwrap();
        let code = sms.last_code().expect("code was sent");

        let err = otp
            .verify(user_id, OtpChannel::Sms, "000000", now)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidProof);

        // The correct code is gone too — one-time consumption on
        // success or failure alike.
        let err = otp
            .verify(user_id, OtpChannel::Sms, &code, now)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidProof);
    }

    #[tokio::test]
    async fn expired_code_is_rejected() {
        let (otp, sms, factors) = factor();
        let user_id = UserId::new();
        enroll_sms(&factors, user_id).await;

        let now = Utc::now();
        otp.send(user_id, OtpChannel::Sms, now).await.unwrap();
        let code = sms.last_code().expect("code was sent");

        let later = now + OtpConfig::default().ttl + chrono::Duration::seconds(1);
        let err = otp
            .verify(user_id, OtpChannel::Sms, &code, later)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidProof);
    }

    #[tokio::test]
    async fn resend_replaces_the_previous_code() {
        let (otp, sms, factors) = factor();
        let user_id = UserId::new();
        enroll_sms(&factors, user_id).await;

        let now = Utc::now();
        otp.send(user_id, OtpChannel::Sms, now).await.unwrap();
        let first = sms.last_code().expect("code was sent");
        otp.send(user_id, OtpChannel::Sms, now).await.unwrap();
        let second = sms.last_code().expect("code was sent");

        // The first code is dead even if it differs from the second
        if first != second {
            let err = otp
                .verify(user_id, OtpChannel::Sms, &first, now)
                .await
                .unwrap_err();
            assert_eq!(err, AuthError::InvalidProof);
        }
        assert!(
            otp.verify(user_id, OtpChannel::Sms, &second, now)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn delivery_failure_leaves_no_usable_code() {
        let (otp, sms, factors) = factor();
        let user_id = UserId::new();
        enroll_sms(&factors, user_id).await;
        sms.fail_next_send();

        let now = Utc::now();
        let err = otp.send(user_id, OtpChannel::Sms, now).await.unwrap_err();
        assert_eq!(err, AuthError::DeliveryFailure);

        // Nothing outstanding to verify against
        let err = otp
            .verify(user_id, OtpChannel::Sms, "123456", now)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidProof);
    }

    #[tokio::test]
    async fn sends_are_rate_limited_per_hour() {
        let (otp, _sms, factors) = factor();
        let user_id = UserId::new();
        enroll_sms(&factors, user_id).await;

        let now = Utc::now();
        for _ in 0..OtpConfig::default().max_sends_per_hour {
            otp.send(user_id, OtpChannel::Sms, now).await.unwrap();
        }
        let err = otp.send(user_id, OtpChannel::Sms, now).await.unwrap_err();
        assert!(matches!(err, AuthError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn unenrolled_channel_is_unsupported() {
        let (otp, _sms, _factors) = factor();
        let err = otp
            .send(UserId::new(), OtpChannel::Sms, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedFactor { .. }));
    }
}
