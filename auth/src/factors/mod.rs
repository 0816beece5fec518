//! Verification factors.
//!
//! One module per factor type, all dispatched by the closed
//! [`FactorType`](crate::state::FactorType) enum. Every factor exposes
//! enrollment and verification in its own shape; the orchestrator owns
//! the dispatch and the shared bookkeeping (audit, last-used stamps,
//! challenge accounting).

pub mod backup;
pub mod otp;
pub mod password;
pub mod totp;
pub mod webauthn;

pub use backup::BackupCodeFactor;
pub use otp::OtpFactor;
pub use password::PasswordFactor;
pub use totp::{TotpEnrollment, TotpFactor};
pub use webauthn::WebAuthnFactor;

use serde::{Deserialize, Serialize};

/// Proof submitted against a factor during challenge verification or
/// factor removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FactorProof {
    /// The account password (primary credential re-verification).
    Password {
        /// Raw password.
        password: String,
    },

    /// A TOTP code from an authenticator app.
    Totp {
        /// Six-digit code.
        code: String,
    },

    /// A delivered one-time code (SMS or email, per the factor type it
    /// is submitted against).
    OneTimeCode {
        /// Delivered numeric code.
        code: String,
    },

    /// A WebAuthn assertion response (JSON, as produced by the client).
    WebAuthn {
        /// Serialized `PublicKeyCredential`.
        assertion: serde_json::Value,
    },

    /// A backup recovery code.
    BackupCode {
        /// Raw recovery code.
        code: String,
    },
}

/// Factor-specific enrollment input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EnrollmentData {
    /// Enroll an authenticator app (no input needed).
    Totp,

    /// Enroll a phone for SMS codes.
    Sms {
        /// Destination number (E.164).
        phone_number: String,
    },

    /// Enroll an email destination for codes.
    Email {
        /// Destination address.
        address: String,
    },

    /// Begin a WebAuthn registration ceremony.
    WebAuthnBegin,

    /// Complete a WebAuthn registration ceremony.
    WebAuthnFinish {
        /// Serialized `RegisterPublicKeyCredential` from the client.
        response: serde_json::Value,
    },
}

/// Factor-specific enrollment output, shown to the user exactly once
/// where secret material is involved.
#[derive(Debug, Clone)]
pub enum EnrollmentMaterial {
    /// TOTP provisioning material (secret + otpauth URI).
    Totp(TotpEnrollment),

    /// WebAuthn creation challenge for the client to sign.
    WebAuthnChallenge(Box<webauthn_rs::prelude::CreationChallengeResponse>),

    /// Fresh backup codes, generated alongside a first enrollment or on
    /// explicit regeneration.
    BackupCodes(Vec<String>),

    /// Enrollment completed with nothing to show.
    Enrolled,
}
