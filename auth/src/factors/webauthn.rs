//! Hardware/public-key credential factor (WebAuthn/FIDO2).
//!
//! The cryptographic ceremony is delegated to `webauthn-rs`; this
//! module owns the contract around it — credential storage (id, COSE
//! public key, anti-replay counter), single-use ceremony state, and
//! counter-regression rejection on every assertion.

use crate::error::{AuthError, Result};
use crate::providers::{ChallengeStore, FactorMaterial, FactorRepository};
use crate::state::{FactorId, FactorType, UserId};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Duration;
use std::sync::Arc;
use webauthn_rs::prelude::{
    Passkey, PasskeyAuthentication, PasskeyRegistration, Url, Webauthn, WebauthnBuilder,
};
use webauthn_rs_proto::{
    CreationChallengeResponse, PublicKeyCredential, RegisterPublicKeyCredential,
    RequestChallengeResponse,
};

/// Ceremony state lifetime.
const CEREMONY_TTL_MINUTES: i64 = 5;

/// WebAuthn registration/assertion driver.
#[derive(Clone)]
pub struct WebAuthnFactor<F, C>
where
    F: FactorRepository + Clone,
    C: ChallengeStore + Clone,
{
    factors: F,
    ceremonies: C,
    webauthn: Arc<Webauthn>,
}

impl<F, C> WebAuthnFactor<F, C>
where
    F: FactorRepository + Clone,
    C: ChallengeStore + Clone,
{
    /// Build the factor for a relying party.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CryptoError`] if the relying party
    /// configuration is invalid.
    pub fn new(factors: F, ceremonies: C, rp_id: &str, rp_origin: &str, rp_name: &str) -> Result<Self> {
        let origin = Url::parse(rp_origin)
            .map_err(|e| AuthError::CryptoError(format!("invalid RP origin: {e}")))?;
        let webauthn = WebauthnBuilder::new(rp_id, &origin)
            .map_err(|e| AuthError::CryptoError(format!("invalid RP configuration: {e}")))?
            .rp_name(rp_name)
            .build()
            .map_err(|e| AuthError::CryptoError(format!("webauthn build failed: {e}")))?;

        Ok(Self {
            factors,
            ceremonies,
            webauthn: Arc::new(webauthn),
        })
    }

    fn registration_key(user_id: UserId) -> String {
        format!("webauthn:reg:{}", user_id.0)
    }

    fn assertion_key(user_id: UserId) -> String {
        format!("webauthn:auth:{}", user_id.0)
    }

    /// Start credential registration.
    ///
    /// # Errors
    ///
    /// Returns error if the ceremony cannot start or state storage
    /// fails.
    pub async fn begin_registration(
        &self,
        user_id: UserId,
        email: &str,
        display_name: &str,
    ) -> Result<CreationChallengeResponse> {
        let (challenge, state) = self
            .webauthn
            .start_passkey_registration(user_id.0, email, display_name, None)
            .map_err(|e| AuthError::CryptoError(format!("registration start failed: {e}")))?;

        let bytes = serde_json::to_vec(&state)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;
        self.ceremonies
            .put_ceremony(
                &Self::registration_key(user_id),
                bytes,
                Duration::minutes(CEREMONY_TTL_MINUTES),
            )
            .await?;

        Ok(challenge)
    }

    /// Complete credential registration.
    ///
    /// # Returns
    ///
    /// The material to persist: credential id, serialized public-key
    /// credential and initial counter.
    ///
    /// # Errors
    ///
    /// - [`AuthError::ChallengeNotFound`] if no registration ceremony is
    ///   pending (or it expired)
    /// - [`AuthError::InvalidProof`] if attestation verification fails
    pub async fn finish_registration(
        &self,
        user_id: UserId,
        response: &RegisterPublicKeyCredential,
    ) -> Result<FactorMaterial> {
        let Some(bytes) = self
            .ceremonies
            .take_ceremony(&Self::registration_key(user_id))
            .await?
        else {
            return Err(AuthError::ChallengeNotFound);
        };
        let state: PasskeyRegistration = serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(response, &state)
            .map_err(|e| {
                tracing::warn!(user_id = %user_id.0, %e, "webauthn attestation rejected");
                AuthError::InvalidProof
            })?;

        let credential_id = URL_SAFE_NO_PAD.encode(passkey.cred_id().as_ref());
        let credential = serde_json::to_value(&passkey)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;

        Ok(FactorMaterial::WebAuthn {
            credential,
            credential_id,
            counter: 0,
        })
    }

    /// Start an assertion ceremony against the user's enrolled
    /// credential.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnsupportedFactor`] if no credential is
    /// enrolled.
    pub async fn begin_authentication(&self, user_id: UserId) -> Result<RequestChallengeResponse> {
        let passkey = self.enrolled_passkey(user_id).await?.1;

        let (challenge, state) = self
            .webauthn
            .start_passkey_authentication(&[passkey])
            .map_err(|e| AuthError::CryptoError(format!("assertion start failed: {e}")))?;

        let bytes = serde_json::to_vec(&state)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;
        self.ceremonies
            .put_ceremony(
                &Self::assertion_key(user_id),
                bytes,
                Duration::minutes(CEREMONY_TTL_MINUTES),
            )
            .await?;

        Ok(challenge)
    }

    /// Complete an assertion ceremony.
    ///
    /// Verifies the signature against the stored public key and rejects
    /// signature-counter regressions (cloned-authenticator detection).
    ///
    /// # Errors
    ///
    /// - [`AuthError::ChallengeNotFound`] if no assertion ceremony is
    ///   pending
    /// - [`AuthError::InvalidProof`] on signature failure or counter
    ///   regression
    pub async fn finish_authentication(
        &self,
        user_id: UserId,
        response: &PublicKeyCredential,
    ) -> Result<FactorId> {
        let Some(bytes) = self
            .ceremonies
            .take_ceremony(&Self::assertion_key(user_id))
            .await?
        else {
            return Err(AuthError::ChallengeNotFound);
        };
        let state: PasskeyAuthentication = serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;

        let result = self
            .webauthn
            .finish_passkey_authentication(response, &state)
            .map_err(|e| {
                tracing::warn!(user_id = %user_id.0, %e, "webauthn assertion rejected");
                AuthError::InvalidProof
            })?;

        let (factor_id, _, stored_counter) = self.enrolled_passkey_full(user_id).await?;

        // Authenticators without counters always report zero; any other
        // non-increasing value means a cloned credential.
        let new_counter = result.counter();
        if new_counter != 0 && new_counter <= stored_counter {
            tracing::warn!(
                user_id = %user_id.0,
                stored_counter,
                new_counter,
                "webauthn counter regression, possible cloned authenticator"
            );
            return Err(AuthError::InvalidProof);
        }
        if new_counter != 0 {
            self.factors
                .update_counter(user_id, factor_id, new_counter)
                .await?;
        }

        Ok(factor_id)
    }

    async fn enrolled_passkey(&self, user_id: UserId) -> Result<(FactorId, Passkey)> {
        let (factor_id, passkey, _) = self.enrolled_passkey_full(user_id).await?;
        Ok((factor_id, passkey))
    }

    async fn enrolled_passkey_full(&self, user_id: UserId) -> Result<(FactorId, Passkey, u32)> {
        let Some((factor_id, material)) = self
            .factors
            .material(user_id, FactorType::WebAuthn)
            .await?
        else {
            return Err(AuthError::UnsupportedFactor {
                factor: "webauthn".into(),
            });
        };

        let FactorMaterial::WebAuthn {
            credential, counter, ..
        } = material
        else {
            return Err(AuthError::InternalError(
                "webauthn enrollment has non-webauthn material".into(),
            ));
        };

        let passkey: Passkey = serde_json::from_value(credential)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;
        Ok((factor_id, passkey, counter))
    }
}
