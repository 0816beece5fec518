//! Velocity sub-assessment: address spread and failure bursts.

use super::{Lookup, RiskFactor, UNAVAILABLE_SCORE};
use crate::config::RiskConfig;
use crate::providers::LoginStats;
use serde_json::json;

/// Penalty for too many distinct source addresses in the trailing hour.
const IP_SPREAD_PENALTY: f64 = 50.0;

/// Penalty for a burst of failed attempts in the trailing half hour.
const FAILURE_BURST_PENALTY: f64 = 50.0;

pub(crate) fn evaluate(config: &RiskConfig, stats: &Lookup<LoginStats>) -> RiskFactor {
    let weight = config.velocity_weight;

    let Lookup::Known(stats) = stats else {
        return RiskFactor {
            name: "velocity",
            score: UNAVAILABLE_SCORE,
            weight,
            evidence: json!({ "signal": "unavailable" }),
        };
    };

    let mut score = 0.0;
    let mut evidence = json!({});

    if stats.distinct_ips_last_hour > config.max_hourly_ips {
        score += IP_SPREAD_PENALTY;
        if let Some(map) = evidence.as_object_mut() {
            map.insert(
                "distinct_ips_last_hour".into(),
                json!(stats.distinct_ips_last_hour),
            );
        }
    }

    if stats.failures_last_half_hour > config.max_recent_failures {
        score += FAILURE_BURST_PENALTY;
        if let Some(map) = evidence.as_object_mut() {
            map.insert(
                "failures_last_half_hour".into(),
                json!(stats.failures_last_half_hour),
            );
        }
    }

    RiskFactor {
        name: "velocity",
        score: score.min(100.0),
        weight,
        evidence,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config() -> RiskConfig {
        RiskConfig::default()
    }

    #[test]
    fn quiet_account_scores_zero() {
        let factor = evaluate(&config(), &Lookup::Known(LoginStats::default()));
        assert!(factor.score.abs() < f64::EPSILON);
    }

    #[test]
    fn ip_spread_above_threshold_carries_penalty() {
        let mut stats = LoginStats::default();
        stats.distinct_ips_last_hour = config().max_hourly_ips + 1;
        let factor = evaluate(&config(), &Lookup::Known(stats));
        assert!((factor.score - IP_SPREAD_PENALTY).abs() < f64::EPSILON);
    }

    #[test]
    fn both_thresholds_cap_at_100() {
        let mut stats = LoginStats::default();
        stats.distinct_ips_last_hour = config().max_hourly_ips + 1;
        stats.failures_last_half_hour = config().max_recent_failures + 1;
        let factor = evaluate(&config(), &Lookup::Known(stats));
        assert!((factor.score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn failed_lookup_degrades_to_neutral() {
        let factor = evaluate(&config(), &Lookup::Failed);
        assert!((factor.score - UNAVAILABLE_SCORE).abs() < f64::EPSILON);
    }
}
