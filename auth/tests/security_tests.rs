//! Security-focused integration tests.
//!
//! Verifies the properties attackers probe for: atomic single-use
//! consumption under concurrency, one session per challenge, token
//! hygiene, deterministic risk scoring, and cautious degradation when
//! signals are unavailable.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{Harness, totp_code_now};
use stepup_auth::config::RiskConfig;
use stepup_auth::crypto::token_hash;
use stepup_auth::factors::{EnrollmentData, EnrollmentMaterial, FactorProof};
use stepup_auth::mocks::{MockAuditLog, MockHistoryRepository, MockReputationProvider};
use stepup_auth::policy::MfaPolicy;
use stepup_auth::providers::{AuditKind, SessionStore};
use stepup_auth::risk::RiskEngine;
use stepup_auth::{AuthOutcome, ChallengeOutcome, FactorType, RiskLevel};
use std::sync::Arc;

/// Two concurrent verifications of a one-factor challenge must issue
/// exactly one session: the challenge record's deletion decides the
/// winner.
#[tokio::test]
async fn concurrent_challenge_completion_issues_one_session() {
    let harness = Harness::new();
    let user_id = harness
        .create_user(
            "user@example.com",
            "Tr0ub4dour&horse!",
            MfaPolicy::required(1),
            MfaPolicy::default(),
        )
        .await;
    harness.seed_low_risk(user_id).await;

    let enrollment = harness
        .auth
        .enroll_factor(user_id, FactorType::Totp, &EnrollmentData::Totp)
        .await
        .unwrap();
    let EnrollmentMaterial::Totp(totp) = enrollment.material else {
        panic!("expected TOTP provisioning material");
    };

    let AuthOutcome::MfaRequired { challenge_id, .. } = harness
        .auth
        .authenticate("user@example.com", "Tr0ub4dour&horse!", &harness.ctx())
        .await
        .unwrap()
    else {
        panic!("expected MFA requirement");
    };

    let auth = Arc::new(harness.auth.clone());
    let code = totp_code_now(&totp.secret_base32);
    let ctx = harness.ctx();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let auth = Arc::clone(&auth);
        let code = code.clone();
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            auth.verify_challenge(
                challenge_id,
                FactorType::Totp,
                &FactorProof::Totp { code },
                &ctx,
            )
            .await
        }));
    }

    let mut sessions = 0;
    for handle in handles {
        if let Ok(Ok(ChallengeOutcome::Complete(_))) = handle.await {
            sessions += 1;
        }
    }
    assert_eq!(sessions, 1, "exactly one concurrent completer may win");
}

/// Raw tokens are never persisted; only their hashes are, and the
/// session resolves through the hash.
#[tokio::test]
async fn stores_never_contain_raw_tokens() {
    let harness = Harness::new();
    let user_id = harness
        .create_user(
            "user@example.com",
            "Tr0ub4dour&horse!",
            MfaPolicy::default(),
            MfaPolicy::default(),
        )
        .await;
    harness.seed_low_risk(user_id).await;

    let AuthOutcome::Success(issued) = harness
        .auth
        .authenticate("user@example.com", "Tr0ub4dour&horse!", &harness.ctx())
        .await
        .unwrap()
    else {
        panic!("expected direct session");
    };

    // Lookup works through the hash only
    let stored = harness
        .sessions
        .find_by_access_hash(&token_hash(&issued.tokens.access_token))
        .await
        .unwrap()
        .expect("session stored");

    assert_ne!(stored.access_token_hash, issued.tokens.access_token);
    assert_ne!(stored.refresh_token_hash, issued.tokens.refresh_token);
    // And the raw token itself is not a valid lookup key
    assert!(
        harness
            .sessions
            .find_by_access_hash(&issued.tokens.access_token)
            .await
            .unwrap()
            .is_none()
    );
}

/// For fixed inputs and fixed historical state, the risk engine
/// returns the same score every time.
#[tokio::test]
async fn risk_assessment_is_deterministic() {
    let harness = Harness::new();
    let user_id = harness
        .create_user(
            "user@example.com",
            "Tr0ub4dour&horse!",
            MfaPolicy::default(),
            MfaPolicy::default(),
        )
        .await;
    harness.seed_low_risk(user_id).await;

    let engine = RiskEngine::new(
        harness.history.clone(),
        harness.reputation.clone(),
        harness.audit.clone(),
        RiskConfig::default(),
    );

    // A fixed context: observed_at is part of the input
    let ctx = harness.ctx();
    let first = engine.assess(Some(user_id), &ctx).await.unwrap();
    let second = engine.assess(Some(user_id), &ctx).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.level, RiskLevel::Low);
}

/// Unavailable history/reputation signals degrade to caution, not
/// leniency: the score rises above the clean baseline but the
/// assessment still completes.
#[tokio::test]
async fn degraded_signals_bias_toward_caution() {
    let history = MockHistoryRepository::new();
    let reputation = MockReputationProvider::new();
    let audit = MockAuditLog::new();
    let engine = RiskEngine::new(
        history.clone(),
        reputation.clone(),
        audit,
        RiskConfig::default(),
    );

    let harness = Harness::new();
    let user_id = harness
        .create_user(
            "user@example.com",
            "Tr0ub4dour&horse!",
            MfaPolicy::default(),
            MfaPolicy::default(),
        )
        .await;
    let ctx = harness.ctx();

    let clean = engine.assess(Some(user_id), &ctx).await.unwrap();

    history.set_failing(true).unwrap();
    reputation.set_failing(true).unwrap();
    let degraded = engine.assess(Some(user_id), &ctx).await.unwrap();

    assert!(
        degraded.aggregate > clean.aggregate,
        "outage must not look safer than a clean read ({} vs {})",
        degraded.aggregate,
        clean.aggregate
    );
}

/// Every stage of a failed and successful authentication leaves an
/// audit record.
#[tokio::test]
async fn audit_trail_covers_the_whole_flow() {
    let harness = Harness::new();
    let user_id = harness
        .create_user(
            "user@example.com",
            "Tr0ub4dour&horse!",
            MfaPolicy::required(1),
            MfaPolicy::default(),
        )
        .await;
    harness.seed_low_risk(user_id).await;

    let enrollment = harness
        .auth
        .enroll_factor(user_id, FactorType::Totp, &EnrollmentData::Totp)
        .await
        .unwrap();
    let EnrollmentMaterial::Totp(totp) = enrollment.material else {
        panic!("expected TOTP provisioning material");
    };
    assert_eq!(harness.audit.count(AuditKind::FactorEnrolled), 1);
    assert_eq!(harness.audit.count(AuditKind::BackupCodesRegenerated), 1);

    // One failed primary attempt
    let _ = harness
        .auth
        .authenticate("user@example.com", "wrong", &harness.ctx())
        .await;
    assert_eq!(harness.audit.count(AuditKind::LoginFailed), 1);

    // Full MFA round trip
    let AuthOutcome::MfaRequired { challenge_id, .. } = harness
        .auth
        .authenticate("user@example.com", "Tr0ub4dour&horse!", &harness.ctx())
        .await
        .unwrap()
    else {
        panic!("expected MFA requirement");
    };
    assert_eq!(harness.audit.count(AuditKind::ChallengeCreated), 1);
    assert!(harness.audit.count(AuditKind::RiskAssessed) >= 1);

    let _ = harness
        .auth
        .verify_challenge(
            challenge_id,
            FactorType::Totp,
            &FactorProof::Totp {
                code: "000000".into(),
            },
            &harness.ctx(),
        )
        .await;
    assert_eq!(harness.audit.count(AuditKind::ChallengeAttemptFailed), 1);

    harness
        .auth
        .verify_challenge(
            challenge_id,
            FactorType::Totp,
            &FactorProof::Totp {
                code: totp_code_now(&totp.secret_base32),
            },
            &harness.ctx(),
        )
        .await
        .unwrap();
    assert_eq!(harness.audit.count(AuditKind::ChallengeCompleted), 1);
    assert_eq!(harness.audit.count(AuditKind::SessionIssued), 1);
}

/// An unenrolled or disallowed factor type is rejected without
/// consuming a challenge attempt.
#[tokio::test]
async fn unsupported_factor_does_not_burn_attempts() {
    let harness = Harness::new();
    let user_id = harness
        .create_user(
            "user@example.com",
            "Tr0ub4dour&horse!",
            MfaPolicy::required(1),
            MfaPolicy::default(),
        )
        .await;
    harness.seed_low_risk(user_id).await;

    let enrollment = harness
        .auth
        .enroll_factor(user_id, FactorType::Totp, &EnrollmentData::Totp)
        .await
        .unwrap();
    let EnrollmentMaterial::Totp(totp) = enrollment.material else {
        panic!("expected TOTP provisioning material");
    };

    let AuthOutcome::MfaRequired { challenge_id, .. } = harness
        .auth
        .authenticate("user@example.com", "Tr0ub4dour&horse!", &harness.ctx())
        .await
        .unwrap()
    else {
        panic!("expected MFA requirement");
    };

    // SMS is not enrolled, so it is not in the challenge's allowed set
    for _ in 0..5 {
        let err = harness
            .auth
            .verify_challenge(
                challenge_id,
                FactorType::SmsOtp,
                &FactorProof::OneTimeCode {
                    code: "123456".into(),
                },
                &harness.ctx(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, stepup_auth::AuthError::UnsupportedFactor { .. }));
    }

    // The challenge is still alive and completable
    let outcome = harness
        .auth
        .verify_challenge(
            challenge_id,
            FactorType::Totp,
            &FactorProof::Totp {
                code: totp_code_now(&totp.secret_base32),
            },
            &harness.ctx(),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, ChallengeOutcome::Complete(_)));
}
