//! # Stepup — risk-adaptive MFA orchestration
//!
//! This crate turns a primary credential check into a policy-driven
//! decision about whether, and how, to demand additional proof of
//! identity before issuing a session.
//!
//! ## Pipeline
//!
//! ```text
//! password → risk engine → policy resolver → orchestrator
//!                                              ├─ session (low risk)
//!                                              └─ challenge → factor
//!                                                 verifiers → session
//! ```
//!
//! ## Features
//!
//! - **Multi-signal risk scoring**: device, location, behavioral,
//!   velocity and threat-intelligence sub-assessments, deterministic
//!   for fixed inputs and history
//! - **Pluggable factors**: password, TOTP, SMS/email one-time codes,
//!   WebAuthn, backup recovery codes — one closed enum, compile-time
//!   dispatch
//! - **Time-bounded challenges**: distinct-factor counting, atomic
//!   failure ceilings, hard expiry with lazy cleanup
//! - **Hash-only sessions**: raw tokens leave the server exactly once
//! - **Injected providers**: every collaborator is a trait; tests run
//!   against in-memory mocks at memory speed
//!
//! ## Example
//!
//! ```rust,ignore
//! use stepup_auth::*;
//!
//! let authenticator = Authenticator::new(env, sealer, &relying_party, config)?;
//!
//! match authenticator.authenticate(email, password, &ctx).await? {
//!     AuthOutcome::Success(session) => { /* low risk, done */ }
//!     AuthOutcome::MfaRequired { challenge_id, .. } => {
//!         // collect a factor proof, then:
//!         authenticator.verify_challenge(challenge_id, factor, &proof, &ctx).await?;
//!     }
//!     AuthOutcome::EnrollmentRequired => { /* route to enrollment */ }
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod config;
pub mod constants;
pub mod context;
pub mod crypto;
pub mod environment;
pub mod error;
pub mod factors;
pub mod fingerprint;
pub mod orchestrator;
pub mod policy;
pub mod providers;
pub mod risk;
pub mod session;
pub mod state;
pub mod stores;

// Mock providers for testing
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use config::AuthConfig;
pub use context::{AuthContext, DeviceDescriptor, GeoLocation};
pub use environment::AuthEnvironment;
pub use error::{AuthError, Result};
pub use factors::{EnrollmentData, EnrollmentMaterial, FactorProof};
pub use orchestrator::{
    AuthOutcome, Authenticator, ChallengeOutcome, EnrollmentOutcome, RelyingParty,
};
pub use policy::{EnforcementLevel, MfaPolicy, MfaRequirement};
pub use risk::{MfaRecommendation, RiskLevel, RiskScore};
pub use state::{
    Challenge, ChallengeId, EnrolledFactor, FactorId, FactorType, IssuedSession, Session,
    SessionId, TokenPair, UserId,
};
