//! Time-based one-time password factor (RFC 6238).
//!
//! Codes are HMAC-SHA1 over the moving time counter with dynamic
//! truncation (RFC 4226 §5.3). The secret is generated server-side,
//! shown once as base32 inside an `otpauth://` provisioning URI, and
//! stored only AES-256-GCM sealed; it never leaves the server again.

use crate::config::TotpConfig;
use crate::crypto::{self, SecretSealer};
use crate::error::{AuthError, Result};
use crate::providers::{FactorMaterial, FactorRepository};
use crate::state::{FactorId, UserId};
use chrono::{DateTime, Utc};
use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Raw secret length in bytes (160 bits, the RFC 4226 recommendation).
const SECRET_BYTES: usize = 20;

/// Provisioning material returned exactly once at enrollment.
#[derive(Debug, Clone, PartialEq)]
pub struct TotpEnrollment {
    /// Base32-encoded secret for manual entry.
    pub secret_base32: String,

    /// `otpauth://` URI for authenticator apps (rendered as a QR code
    /// by the caller).
    pub provisioning_uri: String,
}

/// TOTP verifier.
#[derive(Clone)]
pub struct TotpFactor<F>
where
    F: FactorRepository + Clone,
{
    factors: F,
    sealer: SecretSealer,
    config: TotpConfig,
}

impl<F> TotpFactor<F>
where
    F: FactorRepository + Clone,
{
    /// Create a TOTP factor over the given repository and sealer.
    pub const fn new(factors: F, sealer: SecretSealer, config: TotpConfig) -> Self {
        Self {
            factors,
            sealer,
            config,
        }
    }

    /// Generate a fresh secret and its provisioning material.
    ///
    /// The sealed material is what gets persisted; the enrollment is
    /// shown to the user once and never again.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CryptoError`] if sealing fails.
    pub fn begin_enrollment(&self, account: &str) -> Result<(FactorMaterial, TotpEnrollment)> {
        let mut secret = [0u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut secret);

        let sealed = self.sealer.seal(&secret)?;
        let secret_base32 = BASE32_NOPAD.encode(&secret);
        let provisioning_uri = self.provisioning_uri(account, &secret_base32);

        Ok((
            FactorMaterial::TotpSecret { sealed },
            TotpEnrollment {
                secret_base32,
                provisioning_uri,
            },
        ))
    }

    /// Verify a submitted code against the user's enrolled secret.
    ///
    /// # Returns
    ///
    /// The enrolled factor id on success.
    ///
    /// # Errors
    ///
    /// - [`AuthError::UnsupportedFactor`] if no TOTP enrollment exists
    /// - [`AuthError::InvalidProof`] if the code does not match within
    ///   the skew window
    pub async fn verify(
        &self,
        user_id: UserId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<FactorId> {
        let Some((factor_id, material)) = self
            .factors
            .material(user_id, crate::state::FactorType::Totp)
            .await?
        else {
            return Err(AuthError::UnsupportedFactor {
                factor: "totp".into(),
            });
        };

        let FactorMaterial::TotpSecret { sealed } = material else {
            return Err(AuthError::InternalError(
                "totp enrollment has non-totp material".into(),
            ));
        };

        let secret = self.sealer.open(&sealed)?;
        if verify_code(&secret, code, now, &self.config) {
            Ok(factor_id)
        } else {
            Err(AuthError::InvalidProof)
        }
    }

    fn provisioning_uri(&self, account: &str, secret_base32: &str) -> String {
        let issuer = urlencoding::encode(&self.config.issuer);
        let label = urlencoding::encode(account);
        format!(
            "otpauth://totp/{issuer}:{label}?secret={secret_base32}&issuer={issuer}&algorithm=SHA1&digits={}&period={}",
            self.config.digits, self.config.period,
        )
    }
}

/// Verify a code allowing the configured clock skew either side of now.
#[must_use]
pub fn verify_code(secret: &[u8], code: &str, now: DateTime<Utc>, config: &TotpConfig) -> bool {
    if code.len() != config.digits as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    #[allow(clippy::cast_sign_loss)]
    let current = now.timestamp().max(0) as u64 / u64::from(config.period);

    for offset in 0..=u64::from(config.skew_steps) {
        let ahead = generate_code(secret, current.saturating_add(offset), config.digits);
        if crypto::constant_time_str_eq(code, &ahead) {
            return true;
        }
        if offset > 0 {
            let behind = generate_code(secret, current.saturating_sub(offset), config.digits);
            if crypto::constant_time_str_eq(code, &behind) {
                return true;
            }
        }
    }

    false
}

/// Generate the code for a time counter (RFC 4226 dynamic truncation).
#[must_use]
pub fn generate_code(secret: &[u8], counter: u64, digits: u8) -> String {
    let hmac = compute_hmac(secret, counter);

    let offset = (hmac.last().copied().unwrap_or(0) & 0x0f) as usize;
    let truncated = u32::from_be_bytes([
        hmac.get(offset).copied().unwrap_or(0) & 0x7f,
        hmac.get(offset + 1).copied().unwrap_or(0),
        hmac.get(offset + 2).copied().unwrap_or(0),
        hmac.get(offset + 3).copied().unwrap_or(0),
    ]);

    let code = truncated % 10_u32.pow(u32::from(digits));
    format!("{code:0width$}", width = digits as usize)
}

fn compute_hmac(secret: &[u8], counter: u64) -> Vec<u8> {
    // HMAC accepts keys of any length; new_from_slice cannot fail here.
    let Ok(mut mac) = <HmacSha1 as Mac>::new_from_slice(secret) else {
        return Vec::new();
    };
    mac.update(&counter.to_be_bytes());
    mac.finalize().into_bytes().to_vec()
}
