//! Challenge orchestration: the caller-facing authentication surface.
//!
//! Drives one authentication attempt end to end: primary credential
//! check → risk assessment → policy resolution → direct session or
//! time-bounded challenge → factor verification loop → session
//! issuance. Stateless per attempt; all state lives behind the injected
//! providers.

use crate::config::AuthConfig;
use crate::context::AuthContext;
use crate::crypto::SecretSealer;
use crate::environment::AuthEnvironment;
use crate::error::{AuthError, Result};
use crate::factors::{
    BackupCodeFactor, EnrollmentData, EnrollmentMaterial, FactorProof, OtpFactor, PasswordFactor,
    TotpFactor, WebAuthnFactor,
};
use crate::policy::{self, EnforcementLevel, MfaRequirement};
use crate::providers::{
    AuditEvent, AuditKind, AuditLog, BackupCodeStore, ChallengeStore, EmailProvider,
    FactorMaterial, FactorRepository, HistoryRepository, LocationStamp, OneTimeCodeStore,
    OtpChannel, RateLimiter, ReputationProvider, SessionStore, SmsProvider, UserRecord,
    UserRepository,
};
use crate::risk::RiskEngine;
use crate::session::SessionIssuer;
use crate::state::{
    Challenge, ChallengeId, EnrolledFactor, FactorId, FactorType, IssuedSession, UserId,
};
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeSet;

/// WebAuthn relying-party identity.
#[derive(Debug, Clone)]
pub struct RelyingParty {
    /// RP id (the effective domain, e.g. "example.com").
    pub rp_id: String,

    /// Expected origin (e.g. "<https://app.example.com>").
    pub origin: String,

    /// Human-readable name shown by authenticators.
    pub name: String,
}

/// Outcome of a primary authentication call.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// No additional proof demanded; a session was issued.
    Success(IssuedSession),

    /// Additional proof demanded; a challenge was created.
    MfaRequired {
        /// Challenge to verify against.
        challenge_id: ChallengeId,

        /// Hard deadline for the whole challenge.
        expires_at: chrono::DateTime<Utc>,

        /// Distinct factor types that must succeed.
        required_factors: u32,

        /// Factor types the caller may use.
        available_factors: Vec<FactorType>,
    },

    /// Policy demands MFA but the user has nothing enrolled.
    EnrollmentRequired,
}

/// Outcome of a successful challenge verification call.
#[derive(Debug, Clone)]
pub enum ChallengeOutcome {
    /// All required factors satisfied; challenge deleted, session
    /// issued.
    Complete(IssuedSession),

    /// Factor accepted but more are required; the challenge stays
    /// alive with its time budget unchanged.
    Incomplete {
        /// Distinct factor types satisfied so far.
        satisfied: u32,

        /// Distinct factor types required in total.
        required: u32,
    },
}

/// Result of a factor enrollment.
#[derive(Debug, Clone)]
pub struct EnrollmentOutcome {
    /// Factor-specific material (shown once where secret).
    pub material: EnrollmentMaterial,

    /// Recovery codes generated alongside the user's first enrollment.
    pub backup_codes: Option<Vec<String>>,
}

/// The challenge orchestrator.
///
/// Construct once per process with a concrete environment; every call
/// operates purely on durable state, so any number of instances can
/// serve the same traffic.
#[derive(Clone)]
pub struct Authenticator<U, F, C, O, B, S, H, R, SM, E, RL, A>
where
    U: UserRepository + Clone,
    F: FactorRepository + Clone,
    C: ChallengeStore + Clone,
    O: OneTimeCodeStore + Clone,
    B: BackupCodeStore + Clone,
    S: SessionStore + Clone,
    H: HistoryRepository + Clone,
    R: ReputationProvider + Clone,
    SM: SmsProvider + Clone,
    E: EmailProvider + Clone,
    RL: RateLimiter + Clone,
    A: AuditLog + Clone,
{
    env: AuthEnvironment<U, F, C, O, B, S, H, R, SM, E, RL, A>,
    config: AuthConfig,
    risk: RiskEngine<H, R, A>,
    password: PasswordFactor<U, RL>,
    totp: TotpFactor<F>,
    otp: OtpFactor<O, SM, E, RL, F>,
    webauthn: WebAuthnFactor<F, C>,
    backup: BackupCodeFactor<B>,
    issuer: SessionIssuer<S>,
    /// Verified against when the account does not exist, so unknown
    /// and known emails take the same time.
    decoy_hash: String,
}

impl<U, F, C, O, B, S, H, R, SM, E, RL, A> Authenticator<U, F, C, O, B, S, H, R, SM, E, RL, A>
where
    U: UserRepository + Clone,
    F: FactorRepository + Clone,
    C: ChallengeStore + Clone,
    O: OneTimeCodeStore + Clone,
    B: BackupCodeStore + Clone,
    S: SessionStore + Clone,
    H: HistoryRepository + Clone,
    R: ReputationProvider + Clone,
    SM: SmsProvider + Clone,
    E: EmailProvider + Clone,
    RL: RateLimiter + Clone,
    A: AuditLog + Clone,
{
    /// Build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns error if the WebAuthn relying-party configuration is
    /// invalid or the decoy hash cannot be computed.
    pub fn new(
        env: AuthEnvironment<U, F, C, O, B, S, H, R, SM, E, RL, A>,
        sealer: SecretSealer,
        relying_party: &RelyingParty,
        config: AuthConfig,
    ) -> Result<Self> {
        let risk = RiskEngine::new(
            env.history.clone(),
            env.reputation.clone(),
            env.audit.clone(),
            config.risk.clone(),
        );
        let password = PasswordFactor::new(
            env.users.clone(),
            env.rate_limiter.clone(),
            config.password.clone(),
        );
        let totp = TotpFactor::new(env.factors.clone(), sealer, config.totp.clone());
        let otp = OtpFactor::new(
            env.codes.clone(),
            env.sms.clone(),
            env.email.clone(),
            env.rate_limiter.clone(),
            env.factors.clone(),
            config.otp.clone(),
        );
        let webauthn = WebAuthnFactor::new(
            env.factors.clone(),
            env.challenges.clone(),
            &relying_party.rp_id,
            &relying_party.origin,
            &relying_party.name,
        )?;
        let backup = BackupCodeFactor::new(env.backup_codes.clone(), config.backup.clone());
        let issuer = SessionIssuer::new(env.sessions.clone(), config.session.clone());

        let decoy_hash = password.hash("decoy-credential-for-timing-parity")?;

        Ok(Self {
            env,
            config,
            risk,
            password,
            totp,
            otp,
            webauthn,
            backup,
            issuer,
            decoy_hash,
        })
    }

    /// Record an audit event, logging (never failing) on audit errors.
    async fn audit(&self, event: AuditEvent) {
        if let Err(error) = self.env.audit.record(event).await {
            tracing::warn!(%error, "audit write failed");
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Primary authentication
    // ═══════════════════════════════════════════════════════════

    /// Authenticate with the primary credential.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] — generic; never reveals
    ///   which field failed
    /// - [`AuthError::AccountLocked`] while the lockout is in force
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        ctx: &AuthContext,
    ) -> Result<AuthOutcome> {
        let ctx = ctx.clone().with_email(email);

        if let Err(err) = self.password.ensure_not_locked(email).await {
            tracing::warn!(%email, "authentication rejected by lockout");
            self.audit(
                AuditEvent::new(AuditKind::AccountLocked, false)
                    .ip(ctx.ip_address)
                    .detail(json!({ "email": email })),
            )
            .await;
            return Err(err);
        }

        let user = self.env.users.find_by_email(email).await?;

        let Some(user) = user else {
            // Equalize timing with the real verification path.
            let _ = PasswordFactor::<U, RL>::verify_hash(password, &self.decoy_hash);
            self.password.record_failure(email).await?;
            self.audit(
                AuditEvent::new(AuditKind::LoginFailed, false)
                    .ip(ctx.ip_address)
                    .detail(json!({ "reason": "unknown_account" })),
            )
            .await;
            return Err(AuthError::InvalidCredentials);
        };

        if !PasswordFactor::<U, RL>::verify_hash(password, &user.password_hash) {
            self.password.record_failure(email).await?;
            self.env
                .history
                .record_login(user.user_id, ctx.ip_address, false, ctx.observed_at)
                .await?;
            self.audit(
                AuditEvent::new(AuditKind::LoginFailed, false)
                    .user(user.user_id)
                    .ip(ctx.ip_address),
            )
            .await;
            return Err(AuthError::InvalidCredentials);
        }

        // Primary check passed: assess, resolve, decide.
        let risk = self.risk.assess(Some(user.user_id), &ctx).await?;
        let requirement = policy::resolve(&risk, &user.policy, &user.org_policy);

        tracing::info!(
            user_id = %user.user_id.0,
            risk = risk.aggregate,
            mfa_required = requirement.required,
            "primary authentication succeeded"
        );

        if !requirement.required {
            let issued = self.complete_login(&user, &ctx).await?;
            return Ok(AuthOutcome::Success(issued));
        }

        let enrolled = self.env.factors.list(user.user_id).await?;
        let usable: BTreeSet<FactorType> = enrolled
            .iter()
            .map(|f| f.factor_type)
            .filter(|t| requirement.allowed_factors.contains(t))
            .collect();

        if usable.is_empty() {
            if requirement.enforcement == EnforcementLevel::Required {
                self.audit(
                    AuditEvent::new(AuditKind::LoginSucceeded, true)
                        .user(user.user_id)
                        .ip(ctx.ip_address)
                        .detail(json!({ "outcome": "enrollment_required" })),
                )
                .await;
                return Ok(AuthOutcome::EnrollmentRequired);
            }
            // Risk wanted MFA but policy does not mandate enrollment;
            // nothing to challenge with, so the login proceeds.
            let issued = self.complete_login(&user, &ctx).await?;
            return Ok(AuthOutcome::Success(issued));
        }

        let challenge = self
            .create_challenge(&user, &ctx, &requirement, &usable)
            .await?;

        Ok(AuthOutcome::MfaRequired {
            challenge_id: challenge.challenge_id,
            expires_at: challenge.expires_at,
            required_factors: challenge.required_factors,
            available_factors: usable.into_iter().collect(),
        })
    }

    async fn create_challenge(
        &self,
        user: &UserRecord,
        ctx: &AuthContext,
        requirement: &MfaRequirement,
        usable: &BTreeSet<FactorType>,
    ) -> Result<Challenge> {
        let now = Utc::now();
        // A challenge must be satisfiable: the distinct-type rule means
        // the requirement can never exceed the usable type count.
        #[allow(clippy::cast_possible_truncation)]
        let required_factors = requirement.factor_count.min(usable.len() as u32).max(1);

        let challenge = Challenge {
            challenge_id: ChallengeId::new(),
            user_id: user.user_id,
            ip_address: ctx.ip_address,
            user_agent: ctx.user_agent.clone(),
            required_factors,
            allowed_factors: usable.clone(),
            satisfied: BTreeSet::new(),
            failed_attempts: 0,
            created_at: now,
            expires_at: now + self.config.challenge.ttl,
        };

        self.env.challenges.insert(&challenge).await?;
        self.audit(
            AuditEvent::new(AuditKind::ChallengeCreated, true)
                .user(user.user_id)
                .ip(ctx.ip_address)
                .detail(json!({
                    "challenge_id": challenge.challenge_id.0,
                    "required_factors": required_factors,
                })),
        )
        .await;

        Ok(challenge)
    }

    // ═══════════════════════════════════════════════════════════
    // Challenge verification
    // ═══════════════════════════════════════════════════════════

    /// Request delivery of a one-time code for an active challenge.
    ///
    /// # Errors
    ///
    /// Terminal challenge errors, [`AuthError::UnsupportedFactor`] for
    /// non-OTP factor types, and delivery/rate-limit errors from the
    /// send itself.
    pub async fn send_challenge_code(
        &self,
        challenge_id: ChallengeId,
        factor_type: FactorType,
    ) -> Result<()> {
        let challenge = self.active_challenge(challenge_id).await?;

        if !challenge.allowed_factors.contains(&factor_type) {
            return Err(AuthError::UnsupportedFactor {
                factor: factor_type.as_str().into(),
            });
        }

        let channel = match factor_type {
            FactorType::SmsOtp => OtpChannel::Sms,
            FactorType::EmailOtp => OtpChannel::Email,
            _ => {
                return Err(AuthError::UnsupportedFactor {
                    factor: factor_type.as_str().into(),
                });
            }
        };

        let result = self.otp.send(challenge.user_id, channel, Utc::now()).await;
        let kind = if result.is_ok() {
            AuditKind::OneTimeCodeIssued
        } else {
            AuditKind::OneTimeCodeDeliveryFailed
        };
        self.audit(
            AuditEvent::new(kind, result.is_ok())
                .user(challenge.user_id)
                .detail(json!({ "channel": channel.as_str() })),
        )
        .await;
        result
    }

    /// Begin a WebAuthn assertion for an active challenge.
    ///
    /// # Errors
    ///
    /// Terminal challenge errors, or [`AuthError::UnsupportedFactor`]
    /// if no credential is enrolled or allowed.
    pub async fn begin_challenge_webauthn(
        &self,
        challenge_id: ChallengeId,
    ) -> Result<webauthn_rs::prelude::RequestChallengeResponse> {
        let challenge = self.active_challenge(challenge_id).await?;
        if !challenge.allowed_factors.contains(&FactorType::WebAuthn) {
            return Err(AuthError::UnsupportedFactor {
                factor: "webauthn".into(),
            });
        }
        self.webauthn.begin_authentication(challenge.user_id).await
    }

    /// Verify one factor against an active challenge.
    ///
    /// # Errors
    ///
    /// - [`AuthError::ChallengeNotFound`] / [`AuthError::ChallengeExpired`]
    ///   / [`AuthError::MaxAttemptsExceeded`] — terminal, restart
    /// - [`AuthError::InvalidProof`] — retry against the same challenge
    /// - [`AuthError::UnsupportedFactor`] — factor not allowed here
    pub async fn verify_challenge(
        &self,
        challenge_id: ChallengeId,
        factor_type: FactorType,
        proof: &FactorProof,
        ctx: &AuthContext,
    ) -> Result<ChallengeOutcome> {
        let challenge = self.active_challenge(challenge_id).await?;

        if !challenge.allowed_factors.contains(&factor_type) {
            return Err(AuthError::UnsupportedFactor {
                factor: factor_type.as_str().into(),
            });
        }

        match self.verify_factor(challenge.user_id, factor_type, proof).await {
            Ok(factor_id) => {
                if let Some(factor_id) = factor_id {
                    self.env
                        .factors
                        .touch(challenge.user_id, factor_id, Utc::now())
                        .await?;
                }

                let satisfied = self
                    .env
                    .challenges
                    .record_satisfied(challenge_id, factor_type)
                    .await?;
                self.audit(
                    AuditEvent::new(AuditKind::ChallengeFactorSatisfied, true)
                        .user(challenge.user_id)
                        .ip(ctx.ip_address)
                        .detail(json!({
                            "challenge_id": challenge_id.0,
                            "factor": factor_type.as_str(),
                        })),
                )
                .await;

                if satisfied < challenge.required_factors {
                    return Ok(ChallengeOutcome::Incomplete {
                        satisfied,
                        required: challenge.required_factors,
                    });
                }

                // Exactly one concurrent completer deletes the record
                // and issues the session.
                if !self.env.challenges.remove(challenge_id).await? {
                    return Err(AuthError::ChallengeNotFound);
                }

                let user = self
                    .env
                    .users
                    .find_by_id(challenge.user_id)
                    .await?
                    .ok_or_else(|| {
                        AuthError::InternalError("challenge owner vanished".into())
                    })?;

                self.audit(
                    AuditEvent::new(AuditKind::ChallengeCompleted, true)
                        .user(user.user_id)
                        .ip(ctx.ip_address)
                        .detail(json!({ "challenge_id": challenge_id.0 })),
                )
                .await;

                let issued = self.complete_login(&user, ctx).await?;
                Ok(ChallengeOutcome::Complete(issued))
            }
            Err(AuthError::InvalidProof) => {
                let failures = self.env.challenges.record_failure(challenge_id).await?;
                self.audit(
                    AuditEvent::new(AuditKind::ChallengeAttemptFailed, false)
                        .user(challenge.user_id)
                        .ip(ctx.ip_address)
                        .detail(json!({
                            "challenge_id": challenge_id.0,
                            "factor": factor_type.as_str(),
                            "failures": failures,
                        })),
                )
                .await;

                if failures >= self.config.challenge.max_attempts {
                    self.env.challenges.remove(challenge_id).await?;
                    self.audit(
                        AuditEvent::new(AuditKind::ChallengeInvalidated, false)
                            .user(challenge.user_id)
                            .ip(ctx.ip_address)
                            .detail(json!({ "challenge_id": challenge_id.0 })),
                    )
                    .await;
                    return Err(AuthError::MaxAttemptsExceeded);
                }
                Err(AuthError::InvalidProof)
            }
            Err(other) => Err(other),
        }
    }

    /// Fetch a challenge, enforcing the expiry deadline and cleaning up
    /// lazily.
    async fn active_challenge(&self, challenge_id: ChallengeId) -> Result<Challenge> {
        let Some(challenge) = self.env.challenges.fetch(challenge_id).await? else {
            return Err(AuthError::ChallengeNotFound);
        };

        if challenge.is_expired(Utc::now()) {
            self.env.challenges.remove(challenge_id).await?;
            self.audit(
                AuditEvent::new(AuditKind::ChallengeExpired, false)
                    .user(challenge.user_id)
                    .detail(json!({ "challenge_id": challenge_id.0 })),
            )
            .await;
            return Err(AuthError::ChallengeExpired);
        }

        Ok(challenge)
    }

    /// Dispatch a proof to its verifier.
    ///
    /// Returns the verified factor id when one exists (backup codes may
    /// be consumed without a listable enrollment record).
    async fn verify_factor(
        &self,
        user_id: UserId,
        factor_type: FactorType,
        proof: &FactorProof,
    ) -> Result<Option<FactorId>> {
        let now = Utc::now();
        match (factor_type, proof) {
            (FactorType::Totp, FactorProof::Totp { code }) => {
                self.totp.verify(user_id, code, now).await.map(Some)
            }
            (FactorType::SmsOtp, FactorProof::OneTimeCode { code }) => self
                .otp
                .verify(user_id, OtpChannel::Sms, code, now)
                .await
                .map(Some),
            (FactorType::EmailOtp, FactorProof::OneTimeCode { code }) => self
                .otp
                .verify(user_id, OtpChannel::Email, code, now)
                .await
                .map(Some),
            (FactorType::WebAuthn, FactorProof::WebAuthn { assertion }) => {
                let credential: webauthn_rs::prelude::PublicKeyCredential =
                    serde_json::from_value(assertion.clone())
                        .map_err(|_| AuthError::InvalidProof)?;
                self.webauthn
                    .finish_authentication(user_id, &credential)
                    .await
                    .map(Some)
            }
            (FactorType::BackupCode, FactorProof::BackupCode { code }) => {
                let remaining = self.backup.verify(user_id, code, now).await?;
                if self.backup.is_low(remaining) {
                    self.notify_low_backup_codes(user_id, remaining).await;
                }
                let record = self
                    .env
                    .factors
                    .material(user_id, FactorType::BackupCode)
                    .await?;
                Ok(record.map(|(factor_id, _)| factor_id))
            }
            _ => Err(AuthError::UnsupportedFactor {
                factor: factor_type.as_str().into(),
            }),
        }
    }

    async fn notify_low_backup_codes(&self, user_id: UserId, remaining: u32) {
        self.audit(
            AuditEvent::new(AuditKind::BackupCodesLow, true)
                .user(user_id)
                .detail(json!({ "remaining": remaining })),
        )
        .await;

        let email = match self.env.users.find_by_id(user_id).await {
            Ok(Some(user)) => user.email,
            _ => return,
        };
        if let Err(error) = self
            .env
            .email
            .send_security_alert(
                &email,
                "Backup codes running low",
                &format!(
                    "You have {remaining} backup codes left. Generate a new batch from your security settings."
                ),
            )
            .await
        {
            tracing::warn!(%error, "failed to send low-backup-codes alert");
        }
    }

    /// Issue the session and persist the derived login facts.
    async fn complete_login(&self, user: &UserRecord, ctx: &AuthContext) -> Result<IssuedSession> {
        let issued = self.issuer.issue(user.user_id, ctx).await?;

        self.password.clear_failures(&user.email).await?;

        // Device/location history only ever reflects fully
        // authenticated logins.
        let fingerprint = crate::fingerprint::device_fingerprint(&ctx.device, &ctx.user_agent);
        self.env
            .history
            .record_device(user.user_id, &fingerprint, ctx.observed_at)
            .await?;
        if let Some(location) = &ctx.location {
            self.env
                .history
                .record_location(
                    user.user_id,
                    &LocationStamp {
                        country: location.country.clone(),
                        seen_at: ctx.observed_at,
                    },
                )
                .await?;
        }
        self.env
            .history
            .record_login(user.user_id, ctx.ip_address, true, ctx.observed_at)
            .await?;

        self.audit(
            AuditEvent::new(AuditKind::SessionIssued, true)
                .user(user.user_id)
                .ip(ctx.ip_address)
                .detail(json!({ "session_id": issued.session.session_id.0 })),
        )
        .await;

        Ok(issued)
    }

    // ═══════════════════════════════════════════════════════════
    // Factor management
    // ═══════════════════════════════════════════════════════════

    /// List the user's enrolled factors.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub async fn list_factors(&self, user_id: UserId) -> Result<Vec<EnrolledFactor>> {
        self.env.factors.list(user_id).await
    }

    /// Enroll a factor.
    ///
    /// Recovery codes are generated alongside the user's first
    /// enrollment and returned in the outcome.
    ///
    /// # Errors
    ///
    /// - [`AuthError::UnsupportedFactor`] for mismatched type/data
    /// - [`AuthError::InvalidCredentials`] for unknown users
    pub async fn enroll_factor(
        &self,
        user_id: UserId,
        factor_type: FactorType,
        data: &EnrollmentData,
    ) -> Result<EnrollmentOutcome> {
        let user = self
            .env
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let first_enrollment = self.env.factors.list(user_id).await?.is_empty();

        let (material, display_name, enrollment) = match (factor_type, data) {
            (FactorType::Totp, EnrollmentData::Totp) => {
                let (material, provisioning) = self.totp.begin_enrollment(&user.email)?;
                (
                    material,
                    "Authenticator app".to_string(),
                    EnrollmentMaterial::Totp(provisioning),
                )
            }
            (FactorType::SmsOtp, EnrollmentData::Sms { phone_number }) => (
                FactorMaterial::Phone {
                    number: phone_number.clone(),
                },
                format!("SMS to {}", mask_destination(phone_number)),
                EnrollmentMaterial::Enrolled,
            ),
            (FactorType::EmailOtp, EnrollmentData::Email { address }) => (
                FactorMaterial::Email {
                    address: address.clone(),
                },
                format!("Email to {}", mask_destination(address)),
                EnrollmentMaterial::Enrolled,
            ),
            (FactorType::WebAuthn, EnrollmentData::WebAuthnBegin) => {
                // Two-phase: nothing persisted until the ceremony
                // completes.
                let creation = self
                    .webauthn
                    .begin_registration(user_id, &user.email, &user.email)
                    .await?;
                return Ok(EnrollmentOutcome {
                    material: EnrollmentMaterial::WebAuthnChallenge(Box::new(creation)),
                    backup_codes: None,
                });
            }
            (FactorType::WebAuthn, EnrollmentData::WebAuthnFinish { response }) => {
                let response: webauthn_rs::prelude::RegisterPublicKeyCredential =
                    serde_json::from_value(response.clone())
                        .map_err(|_| AuthError::InvalidProof)?;
                let material = self.webauthn.finish_registration(user_id, &response).await?;
                (
                    material,
                    "Security key".to_string(),
                    EnrollmentMaterial::Enrolled,
                )
            }
            _ => {
                return Err(AuthError::UnsupportedFactor {
                    factor: factor_type.as_str().into(),
                });
            }
        };

        let record = EnrolledFactor {
            factor_id: FactorId::new(),
            factor_type,
            display_name,
            primary: first_enrollment,
            created_at: Utc::now(),
            last_used_at: None,
        };
        self.env.factors.insert(user_id, &record, &material).await?;

        self.audit(
            AuditEvent::new(AuditKind::FactorEnrolled, true)
                .user(user_id)
                .detail(json!({ "factor": factor_type.as_str() })),
        )
        .await;

        // First real factor: provision recovery codes alongside it.
        let backup_codes = if first_enrollment {
            Some(self.provision_backup_codes(user_id).await?)
        } else {
            None
        };

        Ok(EnrollmentOutcome {
            material: enrollment,
            backup_codes,
        })
    }

    async fn provision_backup_codes(&self, user_id: UserId) -> Result<Vec<String>> {
        let codes = self.backup.generate_batch(user_id, Utc::now()).await?;

        let record = EnrolledFactor {
            factor_id: FactorId::new(),
            factor_type: FactorType::BackupCode,
            display_name: "Recovery codes".to_string(),
            primary: false,
            created_at: Utc::now(),
            last_used_at: None,
        };
        self.env
            .factors
            .insert(user_id, &record, &FactorMaterial::BackupCodes)
            .await?;

        self.audit(
            AuditEvent::new(AuditKind::BackupCodesRegenerated, true)
                .user(user_id)
                .detail(json!({ "count": codes.len() })),
        )
        .await;

        Ok(codes)
    }

    /// Regenerate the user's backup codes, invalidating all unused
    /// prior codes.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub async fn regenerate_backup_codes(&self, user_id: UserId) -> Result<Vec<String>> {
        let codes = self.backup.generate_batch(user_id, Utc::now()).await?;
        self.audit(
            AuditEvent::new(AuditKind::BackupCodesRegenerated, true)
                .user(user_id)
                .detail(json!({ "count": codes.len() })),
        )
        .await;
        Ok(codes)
    }

    /// Remove an enrolled factor after re-verification.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidProof`] if the re-verification fails
    /// - [`AuthError::LastFactorRemovalDenied`] if policy enforcement is
    ///   `Required` and this is the last enrolled factor
    pub async fn remove_factor(
        &self,
        user_id: UserId,
        factor_id: FactorId,
        proof: &FactorProof,
    ) -> Result<()> {
        let user = self
            .env
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        self.reverify_for_removal(&user, proof).await?;

        let enrolled = self.env.factors.list(user_id).await?;
        let Some(target) = enrolled.iter().find(|f| f.factor_id == factor_id) else {
            return Err(AuthError::UnsupportedFactor {
                factor: "unknown".into(),
            });
        };

        let enforcement = user.policy.enforcement.max(user.org_policy.enforcement);
        if enforcement == EnforcementLevel::Required && enrolled.len() <= 1 {
            self.audit(
                AuditEvent::new(AuditKind::FactorRemoved, false)
                    .user(user_id)
                    .detail(json!({
                        "factor": target.factor_type.as_str(),
                        "denied": "last_factor",
                    })),
            )
            .await;
            return Err(AuthError::LastFactorRemovalDenied);
        }

        self.env.factors.remove(user_id, factor_id).await?;
        self.audit(
            AuditEvent::new(AuditKind::FactorRemoved, true)
                .user(user_id)
                .detail(json!({ "factor": target.factor_type.as_str() })),
        )
        .await;
        Ok(())
    }

    /// Factor removal demands fresh proof of identity.
    async fn reverify_for_removal(&self, user: &UserRecord, proof: &FactorProof) -> Result<()> {
        let now = Utc::now();
        match proof {
            FactorProof::Password { password } => {
                if PasswordFactor::<U, RL>::verify_hash(password, &user.password_hash) {
                    Ok(())
                } else {
                    Err(AuthError::InvalidProof)
                }
            }
            FactorProof::Totp { code } => self
                .totp
                .verify(user.user_id, code, now)
                .await
                .map(|_| ()),
            FactorProof::OneTimeCode { code } => {
                // Channel follows whichever OTP factor is enrolled.
                let sms = self
                    .env
                    .factors
                    .material(user.user_id, FactorType::SmsOtp)
                    .await?;
                let channel = if sms.is_some() {
                    OtpChannel::Sms
                } else {
                    OtpChannel::Email
                };
                self.otp
                    .verify(user.user_id, channel, code, now)
                    .await
                    .map(|_| ())
            }
            FactorProof::WebAuthn { assertion } => {
                let credential: webauthn_rs::prelude::PublicKeyCredential =
                    serde_json::from_value(assertion.clone())
                        .map_err(|_| AuthError::InvalidProof)?;
                self.webauthn
                    .finish_authentication(user.user_id, &credential)
                    .await
                    .map(|_| ())
            }
            FactorProof::BackupCode { code } => self
                .backup
                .verify(user.user_id, code, now)
                .await
                .map(|_| ()),
        }
    }

    /// Change the account password.
    ///
    /// The new password runs the full strength rule set and the
    /// history reuse check; on success every other session is revoked.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] if the current password is
    ///   wrong
    /// - [`AuthError::WeakPassword`] / [`AuthError::PasswordReuse`] for
    ///   rejected candidates
    pub async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let user = self
            .env
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !PasswordFactor::<U, RL>::verify_hash(current_password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let new_hash = self
            .password
            .prepare_new_password(user_id, &user.email, new_password)
            .await?;
        self.env.users.update_password(user_id, &new_hash).await?;

        // A changed credential invalidates everything issued under the
        // old one.
        let revoked = self.issuer.revoke_all(user_id).await?;
        tracing::info!(user_id = %user_id.0, revoked, "password changed");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Sessions
    // ═══════════════════════════════════════════════════════════

    /// Rotate a session with its refresh token.
    ///
    /// # Errors
    ///
    /// See [`SessionIssuer::refresh`].
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<IssuedSession> {
        self.issuer.refresh(refresh_token).await
    }

    /// Log out: revoke the session behind an access token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SessionNotFound`] for unknown tokens.
    pub async fn logout(&self, access_token: &str) -> Result<()> {
        let session_id = self.issuer.revoke_by_access(access_token).await?;
        self.audit(
            AuditEvent::new(AuditKind::SessionRevoked, true)
                .detail(json!({ "session_id": session_id.0 })),
        )
        .await;
        Ok(())
    }

    /// Revoke every session for a user.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn revoke_all_sessions(&self, user_id: UserId) -> Result<u32> {
        self.issuer.revoke_all(user_id).await
    }
}

/// Mask a destination for display ("+33612345678" → "…5678").
fn mask_destination(destination: &str) -> String {
    let chars: Vec<char> = destination.chars().collect();
    if chars.len() <= 4 {
        return "…".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("…{tail}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn destinations_are_masked_for_display() {
        assert_eq!(mask_destination("+33612345678"), "…5678");
        assert_eq!(mask_destination("abc"), "…");
    }
}
