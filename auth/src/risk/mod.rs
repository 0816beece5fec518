//! Multi-signal risk assessment engine.
//!
//! [`RiskEngine::assess`] is a pure function of the request context plus
//! historical lookups: for fixed inputs and fixed historical state it
//! returns the same [`RiskScore`] every time. Five weighted
//! sub-assessments contribute — device, location, behavioral, velocity
//! and threat intelligence — each capped at 100.
//!
//! Transient lookup failures degrade a single signal to a
//! neutral-but-cautious contribution instead of failing the whole
//! assessment, so a partial outage never blocks legitimate logins
//! outright and never biases lenient.

mod behavioral;
mod device;
mod location;
mod threat;
mod velocity;

use crate::config::RiskConfig;
use crate::context::AuthContext;
use crate::error::Result;
use crate::providers::{AuditEvent, AuditKind, AuditLog, HistoryRepository, ReputationProvider};
use crate::state::{FactorType, UserId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;

/// Score given to a signal whose lookup failed: above the neutral
/// floor, below the penalty band — caution without forced MFA.
pub(crate) const UNAVAILABLE_SCORE: f64 = 50.0;

/// One weighted contribution to an assessment.
///
/// Serialized into the audit trail; never read back by the core.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskFactor {
    /// Sub-assessment name ("device", "location", ...).
    pub name: &'static str,

    /// Raw score, 0–100.
    pub score: f64,

    /// Weight, 0–1. All five weights sum to 1.
    pub weight: f64,

    /// Free-form evidence payload kept for audit.
    pub evidence: serde_json::Value,
}

impl RiskFactor {
    /// Weighted contribution to the aggregate.
    #[must_use]
    pub fn contribution(&self) -> f64 {
        self.score * self.weight
    }
}

/// Risk level bucketed by fixed aggregate thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Aggregate < 30.
    Low,
    /// Aggregate < 60.
    Medium,
    /// Aggregate < 80.
    High,
    /// Aggregate ≥ 80.
    Critical,
}

impl RiskLevel {
    /// Bucket an aggregate score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            Self::Low
        } else if score < 60.0 {
            Self::Medium
        } else if score < 80.0 {
            Self::High
        } else {
            Self::Critical
        }
    }
}

/// The engine's MFA recommendation, derived from the risk level.
///
/// This mapping is the single source of truth for "how suspicious is
/// this login" and is deterministic given the level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MfaRecommendation {
    /// Whether additional proof is recommended.
    pub required: bool,

    /// Minimum distinct factors recommended.
    pub min_factors: u32,

    /// Factor types suggested at this level.
    pub suggested_factors: BTreeSet<FactorType>,
}

impl MfaRecommendation {
    /// Derive the recommendation for a level.
    #[must_use]
    pub fn for_level(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => Self {
                required: false,
                min_factors: 1,
                suggested_factors: BTreeSet::from(FactorType::second_factors()),
            },
            RiskLevel::Medium => Self {
                required: true,
                min_factors: 1,
                suggested_factors: BTreeSet::from(FactorType::second_factors()),
            },
            RiskLevel::High => Self {
                required: true,
                min_factors: 1,
                suggested_factors: BTreeSet::from([
                    FactorType::Totp,
                    FactorType::WebAuthn,
                    FactorType::BackupCode,
                ]),
            },
            RiskLevel::Critical => Self {
                required: true,
                min_factors: 2,
                suggested_factors: BTreeSet::from([
                    FactorType::Totp,
                    FactorType::WebAuthn,
                    FactorType::BackupCode,
                ]),
            },
        }
    }
}

/// Result of one assessment. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskScore {
    /// Weighted aggregate, 0–100.
    pub aggregate: f64,

    /// Bucketed level.
    pub level: RiskLevel,

    /// The contributing factors, kept for audit.
    pub factors: Vec<RiskFactor>,

    /// Derived MFA recommendation.
    pub recommendation: MfaRecommendation,
}

/// Outcome of a historical lookup as the sub-assessments see it.
///
/// `Failed` marks a transient storage/collaborator error; the
/// evaluation functions map it to [`UNAVAILABLE_SCORE`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Lookup<T> {
    /// The lookup completed (possibly finding nothing).
    Known(T),
    /// The lookup failed transiently.
    Failed,
}

impl<T> Lookup<T> {
    fn from_result(result: Result<T>, signal: &'static str) -> Self {
        match result {
            Ok(value) => Self::Known(value),
            Err(error) => {
                tracing::warn!(signal, %error, "risk signal lookup failed, degrading to neutral");
                Self::Failed
            }
        }
    }
}

/// The risk assessment engine.
///
/// Pure apart from an advisory audit write of the resulting score;
/// "now" is taken from the context's event timestamp so identical
/// inputs yield identical output.
#[derive(Clone)]
pub struct RiskEngine<H, R, A>
where
    H: HistoryRepository + Clone,
    R: ReputationProvider + Clone,
    A: AuditLog + Clone,
{
    history: H,
    reputation: R,
    audit: A,
    config: RiskConfig,
}

impl<H, R, A> RiskEngine<H, R, A>
where
    H: HistoryRepository + Clone,
    R: ReputationProvider + Clone,
    A: AuditLog + Clone,
{
    /// Create an engine over the given collaborators.
    pub const fn new(history: H, reputation: R, audit: A, config: RiskConfig) -> Self {
        Self {
            history,
            reputation,
            audit,
            config,
        }
    }

    /// Assess one authentication attempt.
    ///
    /// `user_id` is `None` for identities that failed to resolve (the
    /// new-user baseline applies).
    ///
    /// # Errors
    ///
    /// Infallible in practice — lookup failures degrade per-signal —
    /// but kept fallible for forward compatibility of the contract.
    pub async fn assess(&self, user_id: Option<UserId>, ctx: &AuthContext) -> Result<RiskScore> {
        let now = ctx.observed_at;

        let fingerprint = crate::fingerprint::device_fingerprint(&ctx.device, &ctx.user_agent);

        let device_history = match user_id {
            Some(uid) => {
                Lookup::from_result(self.history.device_seen(uid, &fingerprint).await, "device")
            }
            None => Lookup::Known(None),
        };

        let (known_countries, last_location) = match user_id {
            Some(uid) => (
                Lookup::from_result(self.history.known_countries(uid).await, "location"),
                Lookup::from_result(self.history.last_location(uid).await, "location"),
            ),
            None => (Lookup::Known(Vec::new()), Lookup::Known(None)),
        };

        let stats = match user_id {
            Some(uid) => {
                Lookup::from_result(self.history.login_stats(uid, now).await, "login_stats")
            }
            None => Lookup::Known(crate::providers::LoginStats::default()),
        };

        let ip_reputation = Lookup::from_result(
            self.reputation.ip_reputation(ctx.ip_address).await,
            "ip_reputation",
        );
        let domain_reputation = match ctx.email.as_deref().and_then(|e| e.split_once('@')) {
            Some((_, domain)) => Lookup::from_result(
                self.reputation
                    .domain_reputation(domain)
                    .await
                    .map(Option::Some),
                "domain_reputation",
            ),
            None => Lookup::Known(None),
        };

        let factors = vec![
            device::evaluate(
                &self.config,
                user_id.is_some(),
                &device_history,
                ctx.device.untrusted,
                now,
            ),
            location::evaluate(
                &self.config,
                ctx.location.as_ref(),
                &known_countries,
                &last_location,
                now,
            ),
            behavioral::evaluate(&self.config, &stats, now),
            velocity::evaluate(&self.config, &stats),
            threat::evaluate(&self.config, &ip_reputation, &domain_reputation),
        ];

        let aggregate = factors
            .iter()
            .map(RiskFactor::contribution)
            .sum::<f64>()
            .clamp(0.0, 100.0);
        let level = RiskLevel::from_score(aggregate);
        let recommendation = MfaRecommendation::for_level(level);

        tracing::debug!(
            aggregate,
            ?level,
            mfa_recommended = recommendation.required,
            "risk assessment complete"
        );

        let score = RiskScore {
            aggregate,
            level,
            factors,
            recommendation,
        };

        // Advisory audit write; never authoritative, never fatal.
        let mut event = AuditEvent::new(AuditKind::RiskAssessed, true)
            .ip(ctx.ip_address)
            .detail(json!({
                "aggregate": score.aggregate,
                "level": score.level,
                "factors": score.factors,
            }));
        if let Some(uid) = user_id {
            event = event.user(uid);
        }
        if let Err(error) = self.audit.record(event).await {
            tracing::warn!(%error, "failed to audit risk assessment");
        }

        Ok(score)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn levels_bucket_at_fixed_thresholds() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(29.9), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(30.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(59.9), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(79.9), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(80.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(100.0), RiskLevel::Critical);
    }

    #[test]
    fn low_risk_never_recommends_mfa() {
        let rec = MfaRecommendation::for_level(RiskLevel::Low);
        assert!(!rec.required);
        assert_eq!(rec.min_factors, 1);
    }

    #[test]
    fn critical_risk_demands_two_distinct_factors() {
        let rec = MfaRecommendation::for_level(RiskLevel::Critical);
        assert!(rec.required);
        assert_eq!(rec.min_factors, 2);
    }

    #[test]
    fn factor_contribution_is_score_times_weight() {
        let factor = RiskFactor {
            name: "device",
            score: 80.0,
            weight: 0.25,
            evidence: serde_json::Value::Null,
        };
        assert!((factor.contribution() - 20.0).abs() < f64::EPSILON);
    }
}
