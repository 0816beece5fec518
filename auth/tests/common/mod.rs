//! Shared test harness: an orchestrator wired to in-memory mocks.

#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use chrono::{Duration, Utc};
use stepup_auth::config::{AuthConfig, PasswordConfig};
use stepup_auth::crypto::SecretSealer;
use stepup_auth::factors::password::PasswordFactor;
use stepup_auth::fingerprint::device_fingerprint;
use stepup_auth::mocks::{
    MockAuditLog, MockBackupCodeStore, MockChallengeStore, MockEmailProvider,
    MockFactorRepository, MockHistoryRepository, MockOneTimeCodeStore, MockRateLimiter,
    MockReputationProvider, MockSessionStore, MockSmsProvider, MockUserRepository,
};
use stepup_auth::policy::MfaPolicy;
use stepup_auth::providers::{HistoryRepository, LocationStamp, UserRecord};
use stepup_auth::{
    AuthContext, AuthEnvironment, Authenticator, DeviceDescriptor, GeoLocation, RelyingParty,
    UserId,
};

/// Orchestrator type over the full mock environment.
pub type MockAuthenticator = Authenticator<
    MockUserRepository,
    MockFactorRepository,
    MockChallengeStore,
    MockOneTimeCodeStore,
    MockBackupCodeStore,
    MockSessionStore,
    MockHistoryRepository,
    MockReputationProvider,
    MockSmsProvider,
    MockEmailProvider,
    MockRateLimiter,
    MockAuditLog,
>;

/// All mocks plus the orchestrator built over them.
pub struct Harness {
    pub users: MockUserRepository,
    pub factors: MockFactorRepository,
    pub challenges: MockChallengeStore,
    pub codes: MockOneTimeCodeStore,
    pub backup_codes: MockBackupCodeStore,
    pub sessions: MockSessionStore,
    pub history: MockHistoryRepository,
    pub reputation: MockReputationProvider,
    pub sms: MockSmsProvider,
    pub email: MockEmailProvider,
    pub rate_limiter: MockRateLimiter,
    pub audit: MockAuditLog,
    pub auth: MockAuthenticator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AuthConfig::default())
    }

    pub fn with_config(config: AuthConfig) -> Self {
        let users = MockUserRepository::new();
        let factors = MockFactorRepository::new();
        let challenges = MockChallengeStore::new();
        let codes = MockOneTimeCodeStore::new();
        let backup_codes = MockBackupCodeStore::new();
        let sessions = MockSessionStore::new();
        let history = MockHistoryRepository::new();
        let reputation = MockReputationProvider::new();
        let sms = MockSmsProvider::new();
        let email = MockEmailProvider::new();
        let rate_limiter = MockRateLimiter::new();
        let audit = MockAuditLog::new();

        let env = AuthEnvironment::new(
            users.clone(),
            factors.clone(),
            challenges.clone(),
            codes.clone(),
            backup_codes.clone(),
            sessions.clone(),
            history.clone(),
            reputation.clone(),
            sms.clone(),
            email.clone(),
            rate_limiter.clone(),
            audit.clone(),
        );

        let auth = Authenticator::new(
            env,
            SecretSealer::generate(),
            &RelyingParty {
                rp_id: "localhost".into(),
                origin: "http://localhost:3000".into(),
                name: "Stepup Test".into(),
            },
            config,
        )
        .expect("authenticator construction");

        Self {
            users,
            factors,
            challenges,
            codes,
            backup_codes,
            sessions,
            history,
            reputation,
            sms,
            email,
            rate_limiter,
            audit,
            auth,
        }
    }

    /// Seed a user with the given password and policies.
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        policy: MfaPolicy,
        org_policy: MfaPolicy,
    ) -> UserId {
        let hasher = PasswordFactor::new(
            self.users.clone(),
            self.rate_limiter.clone(),
            PasswordConfig::default(),
        );
        let user_id = UserId::new();
        self.users
            .insert_user(UserRecord {
                user_id,
                email: email.to_string(),
                password_hash: hasher.hash(password).unwrap(),
                policy,
                org_policy,
                created_at: Utc::now(),
            })
            .unwrap();
        user_id
    }

    /// A fixed low-suspicion request context.
    pub fn ctx(&self) -> AuthContext {
        AuthContext::new(
            "198.51.100.4".parse().unwrap(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0)",
            DeviceDescriptor {
                platform: Some("macOS".into()),
                timezone: Some("Europe/Paris".into()),
                language: Some("fr-FR".into()),
                screen: Some("2560x1440@24".into()),
                untrusted: false,
            },
        )
        .with_location(GeoLocation::country("FR"))
    }

    /// Seed history so `ctx()` assesses as low risk: an old known
    /// device, a familiar country, and a typical login hour.
    pub async fn seed_low_risk(&self, user_id: UserId) {
        let ctx = self.ctx();
        let fingerprint = device_fingerprint(&ctx.device, &ctx.user_agent);
        self.history
            .record_device(user_id, &fingerprint, ctx.observed_at - Duration::days(90))
            .await
            .unwrap();
        self.history
            .record_location(
                user_id,
                &LocationStamp {
                    country: "FR".into(),
                    seen_at: ctx.observed_at - Duration::days(2),
                },
            )
            .await
            .unwrap();
        // Same hour on previous days: typical login time
        for days in 2..=6 {
            self.history
                .record_login(
                    user_id,
                    ctx.ip_address,
                    true,
                    ctx.observed_at - Duration::days(days),
                )
                .await
                .unwrap();
        }
    }
}

/// Current TOTP code for a base32-encoded secret.
pub fn totp_code_now(secret_base32: &str) -> String {
    let secret = data_encoding::BASE32_NOPAD
        .decode(secret_base32.as_bytes())
        .expect("valid base32 secret");
    let counter = u64::try_from(Utc::now().timestamp()).unwrap_or(0) / 30;
    stepup_auth::factors::totp::generate_code(&secret, counter, 6)
}
