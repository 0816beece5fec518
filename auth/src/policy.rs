//! MFA policy resolution.
//!
//! Merges the user-level policy, the organization-level policy and the
//! risk engine's recommendation into one effective [`MfaRequirement`].
//! Requirements are derived per attempt and never persisted.

use crate::risk::RiskScore;
use crate::state::FactorType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Policy enforcement level, ordered from least to most restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementLevel {
    /// MFA never demanded by this policy.
    Disabled,
    /// MFA demanded only when risk recommends it.
    Optional,
    /// MFA always demanded.
    Required,
}

/// A configured MFA policy (user- or organization-level).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MfaPolicy {
    /// Enforcement level.
    pub enforcement: EnforcementLevel,

    /// Minimum number of distinct factors this policy demands.
    pub factor_count: u32,

    /// Factor types this policy allows.
    pub allowed_factors: BTreeSet<FactorType>,
}

impl Default for MfaPolicy {
    fn default() -> Self {
        Self {
            enforcement: EnforcementLevel::Optional,
            factor_count: 1,
            allowed_factors: BTreeSet::from(FactorType::second_factors()),
        }
    }
}

impl MfaPolicy {
    /// A policy that never demands MFA on its own.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enforcement: EnforcementLevel::Disabled,
            factor_count: 1,
            allowed_factors: BTreeSet::from(FactorType::second_factors()),
        }
    }

    /// A policy that always demands `factor_count` distinct factors.
    #[must_use]
    pub fn required(factor_count: u32) -> Self {
        Self {
            enforcement: EnforcementLevel::Required,
            factor_count,
            allowed_factors: BTreeSet::from(FactorType::second_factors()),
        }
    }
}

/// The effective, resolved MFA requirement for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MfaRequirement {
    /// Whether additional proof is demanded.
    pub required: bool,

    /// Distinct factor types that must succeed (≥ 1).
    pub factor_count: u32,

    /// Factor types the user may satisfy the requirement with.
    pub allowed_factors: BTreeSet<FactorType>,

    /// Most restrictive of the configured enforcement levels.
    pub enforcement: EnforcementLevel,
}

/// Merge the three requirement sources into one effective requirement.
///
/// Merge rules — safety never decreases:
/// - `required` is true if *any* source demands it
/// - `factor_count` is the maximum across sources
/// - `allowed_factors` is the intersection, falling back to the user
///   policy's set when the intersection is empty (misconfiguration must
///   never produce an unusable, empty policy)
/// - `enforcement` is the most restrictive configured level
#[must_use]
pub fn resolve(risk: &RiskScore, user_policy: &MfaPolicy, org_policy: &MfaPolicy) -> MfaRequirement {
    let recommendation = &risk.recommendation;

    let required = user_policy.enforcement == EnforcementLevel::Required
        || org_policy.enforcement == EnforcementLevel::Required
        || recommendation.required;

    let factor_count = user_policy
        .factor_count
        .max(org_policy.factor_count)
        .max(recommendation.min_factors)
        .max(1);

    let mut allowed: BTreeSet<FactorType> = user_policy
        .allowed_factors
        .intersection(&org_policy.allowed_factors)
        .copied()
        .collect();
    allowed = allowed
        .intersection(&recommendation.suggested_factors)
        .copied()
        .collect();
    if allowed.is_empty() {
        allowed.clone_from(&user_policy.allowed_factors);
    }

    let enforcement = user_policy.enforcement.max(org_policy.enforcement);

    MfaRequirement {
        required,
        factor_count,
        allowed_factors: allowed,
        enforcement,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::risk::{MfaRecommendation, RiskLevel};

    fn risk_with(required: bool, min_factors: u32) -> RiskScore {
        RiskScore {
            aggregate: if required { 65.0 } else { 10.0 },
            level: if required {
                RiskLevel::High
            } else {
                RiskLevel::Low
            },
            factors: Vec::new(),
            recommendation: MfaRecommendation {
                required,
                min_factors,
                suggested_factors: BTreeSet::from(FactorType::second_factors()),
            },
        }
    }

    #[test]
    fn any_source_demanding_mfa_wins() {
        let risk = risk_with(false, 1);
        let user = MfaPolicy::required(1);
        let org = MfaPolicy::disabled();

        let req = resolve(&risk, &user, &org);
        assert!(req.required);
    }

    #[test]
    fn risk_recommendation_alone_requires_mfa() {
        let risk = risk_with(true, 1);
        let req = resolve(&risk, &MfaPolicy::disabled(), &MfaPolicy::disabled());
        assert!(req.required);
    }

    #[test]
    fn factor_count_is_maximum_across_sources() {
        let risk = risk_with(true, 2);
        let user = MfaPolicy::required(1);
        let org = MfaPolicy::default();

        let req = resolve(&risk, &user, &org);
        assert_eq!(req.factor_count, 2);
    }

    #[test]
    fn allowed_factors_is_intersection() {
        let risk = risk_with(true, 1);
        let mut user = MfaPolicy::default();
        user.allowed_factors = BTreeSet::from([FactorType::Totp, FactorType::WebAuthn]);
        let mut org = MfaPolicy::default();
        org.allowed_factors = BTreeSet::from([FactorType::Totp, FactorType::SmsOtp]);

        let req = resolve(&risk, &user, &org);
        assert_eq!(req.allowed_factors, BTreeSet::from([FactorType::Totp]));
    }

    #[test]
    fn empty_intersection_falls_back_to_user_set() {
        let risk = risk_with(true, 1);
        let mut user = MfaPolicy::default();
        user.allowed_factors = BTreeSet::from([FactorType::Totp]);
        let mut org = MfaPolicy::default();
        org.allowed_factors = BTreeSet::from([FactorType::SmsOtp]);

        let req = resolve(&risk, &user, &org);
        assert_eq!(req.allowed_factors, user.allowed_factors);
    }

    #[test]
    fn enforcement_is_most_restrictive() {
        let risk = risk_with(false, 1);
        let user = MfaPolicy::disabled();
        let org = MfaPolicy::required(1);

        let req = resolve(&risk, &user, &org);
        assert_eq!(req.enforcement, EnforcementLevel::Required);
    }

    #[test]
    fn factor_count_never_below_one() {
        let risk = risk_with(false, 0);
        let mut user = MfaPolicy::disabled();
        user.factor_count = 0;
        let mut org = MfaPolicy::disabled();
        org.factor_count = 0;

        let req = resolve(&risk, &user, &org);
        assert_eq!(req.factor_count, 1);
    }
}
