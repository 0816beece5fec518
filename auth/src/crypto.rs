//! Shared cryptographic helpers.
//!
//! Random token/code generation, SHA-256 token hashing, constant-time
//! comparison and AES-256-GCM sealing of factor secrets at rest. All
//! operations here are synchronous and non-blocking; only stores and
//! delivery channels suspend.

use crate::error::{AuthError, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Bytes of entropy in bearer/refresh tokens.
const TOKEN_BYTES: usize = 32;

/// AES-GCM nonce length in bytes.
const NONCE_BYTES: usize = 12;

/// Salt length for salted code hashes.
const SALT_BYTES: usize = 16;

/// Generate an opaque high-entropy token (256 bits, base64url).
#[must_use]
pub fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hash of a token, base64url-encoded.
///
/// Stores persist only this value; possession of the store never yields
/// a usable bearer token.
#[must_use]
pub fn token_hash(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Generate a fixed-length numeric one-time code.
#[must_use]
pub fn random_numeric_code(digits: u8) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..digits)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Generate a code from a reduced, ambiguity-free alphabet.
#[must_use]
pub fn random_code_from_alphabet(length: usize, alphabet: &[u8]) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(alphabet[rng.gen_range(0..alphabet.len())]))
        .collect()
}

/// Generate a fresh random salt.
#[must_use]
pub fn random_salt() -> [u8; SALT_BYTES] {
    let mut salt = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Salted SHA-256 hash of a short code, base64url-encoded as
/// `salt.digest`.
#[must_use]
pub fn salted_code_hash(code: &str, salt: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(code.as_bytes());
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(salt),
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    )
}

/// Re-hash `code` with the salt embedded in `stored` and compare in
/// constant time.
#[must_use]
pub fn verify_salted_code(code: &str, stored: &str) -> bool {
    let Some((salt_part, _)) = stored.split_once('.') else {
        return false;
    };
    let Ok(salt) = URL_SAFE_NO_PAD.decode(salt_part) else {
        return false;
    };
    let candidate = salted_code_hash(code, &salt);
    constant_time_str_eq(&candidate, stored)
}

/// Constant-time string equality for secret-derived values.
#[must_use]
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    constant_time_eq::constant_time_eq(a.as_bytes(), b.as_bytes())
}

/// AES-256-GCM sealer for factor secrets at rest.
///
/// Sealed values are `base64url(nonce || ciphertext)`; a fresh nonce is
/// drawn for every seal.
#[derive(Clone)]
pub struct SecretSealer {
    key: [u8; 32],
}

impl std::fmt::Debug for SecretSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretSealer").finish_non_exhaustive()
    }
}

impl SecretSealer {
    /// Build a sealer from a 256-bit key.
    #[must_use]
    pub const fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Generate a sealer with a fresh random key.
    ///
    /// Intended for tests and ephemeral deployments; production keys
    /// come from the application's secret management.
    #[must_use]
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Encrypt a secret for storage.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CryptoError`] if encryption fails.
    pub fn seal(&self, plaintext: &[u8]) -> Result<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| AuthError::CryptoError(format!("invalid key: {e}")))?;

        let mut nonce_bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| AuthError::CryptoError(format!("seal failed: {e}")))?;

        let mut combined = Vec::with_capacity(NONCE_BYTES + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(combined))
    }

    /// Decrypt a previously sealed secret.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CryptoError`] if the value is malformed or
    /// fails authentication.
    pub fn open(&self, sealed: &str) -> Result<Vec<u8>> {
        let combined = URL_SAFE_NO_PAD
            .decode(sealed)
            .map_err(|e| AuthError::CryptoError(format!("malformed sealed value: {e}")))?;

        if combined.len() <= NONCE_BYTES {
            return Err(AuthError::CryptoError("sealed value too short".into()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_BYTES);
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| AuthError::CryptoError(format!("invalid key: {e}")))?;

        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| AuthError::CryptoError(format!("open failed: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_opaque() {
        let a = random_token();
        let b = random_token();
        assert_ne!(a, b);
        // 32 bytes base64url without padding
        assert_eq!(a.len(), 43);
    }

    #[test]
    fn token_hash_never_equals_raw_token() {
        let token = random_token();
        assert_ne!(token_hash(&token), token);
        // Deterministic
        assert_eq!(token_hash(&token), token_hash(&token));
    }

    #[test]
    fn numeric_codes_have_requested_length() {
        let code = random_numeric_code(6);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn salted_hash_round_trip() {
        let salt = random_salt();
        let stored = salted_code_hash("CODE123", &salt);
        assert!(verify_salted_code("CODE123", &stored));
        assert!(!verify_salted_code("CODE124", &stored));
    }

    #[test]
    fn same_code_different_salts_differ() {
        let a = salted_code_hash("CODE123", &random_salt());
        let b = salted_code_hash("CODE123", &random_salt());
        assert_ne!(a, b);
    }

    #[test]
    fn seal_and_open_round_trip() {
        let sealer = SecretSealer::generate();
        let sealed = sealer.seal(b"totp secret bytes").unwrap();
        assert_eq!(sealer.open(&sealed).unwrap(), b"totp secret bytes");
    }

    #[test]
    fn sealed_values_are_nondeterministic() {
        let sealer = SecretSealer::generate();
        let a = sealer.seal(b"secret").unwrap();
        let b = sealer.seal(b"secret").unwrap();
        assert_ne!(a, b, "fresh nonce per seal");
    }

    #[test]
    fn open_rejects_wrong_key() {
        let sealed = SecretSealer::generate().seal(b"secret").unwrap();
        assert!(SecretSealer::generate().open(&sealed).is_err());
    }
}
