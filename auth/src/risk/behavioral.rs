//! Behavioral pattern sub-assessment.

use super::{Lookup, RiskFactor, UNAVAILABLE_SCORE};
use crate::config::RiskConfig;
use crate::providers::LoginStats;
use chrono::{DateTime, Timelike, Utc};
use serde_json::json;

/// Score for users with no behavioral history yet.
const NO_HISTORY_SCORE: f64 = 20.0;

/// Penalty for logging in at an hour outside the user's pattern.
const ATYPICAL_HOUR_PENALTY: f64 = 35.0;

/// Penalty for excessive logins in the trailing day.
const EXCESSIVE_LOGINS_PENALTY: f64 = 30.0;

/// Penalty for excessive password changes in the trailing week.
const PASSWORD_CHURN_PENALTY: f64 = 35.0;

pub(crate) fn evaluate(
    config: &RiskConfig,
    stats: &Lookup<LoginStats>,
    now: DateTime<Utc>,
) -> RiskFactor {
    let weight = config.behavioral_weight;

    let Lookup::Known(stats) = stats else {
        return RiskFactor {
            name: "behavioral",
            score: UNAVAILABLE_SCORE,
            weight,
            evidence: json!({ "signal": "unavailable" }),
        };
    };

    let total_history: u32 = stats.hour_histogram.iter().sum();
    if total_history == 0 {
        return RiskFactor {
            name: "behavioral",
            score: NO_HISTORY_SCORE,
            weight,
            evidence: json!({ "reason": "no_login_history" }),
        };
    }

    let mut score = 0.0;
    let mut evidence = json!({});

    let hour = now.hour() as usize;
    let typical = stats.hour_histogram[hour] >= config.typical_hour_min_count;
    if !typical {
        score += ATYPICAL_HOUR_PENALTY;
        if let Some(map) = evidence.as_object_mut() {
            map.insert("atypical_hour".into(), json!(hour));
        }
    }

    if stats.logins_last_day > config.max_daily_logins {
        score += EXCESSIVE_LOGINS_PENALTY;
        if let Some(map) = evidence.as_object_mut() {
            map.insert("logins_last_day".into(), json!(stats.logins_last_day));
        }
    }

    if stats.password_changes_last_week > config.max_weekly_password_changes {
        score += PASSWORD_CHURN_PENALTY;
        if let Some(map) = evidence.as_object_mut() {
            map.insert(
                "password_changes_last_week".into(),
                json!(stats.password_changes_last_week),
            );
        }
    }

    RiskFactor {
        name: "behavioral",
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

    fn stats_with_typical_hour(hour: usize) -> LoginStats {
        let mut stats = LoginStats::default();
        stats.hour_histogram[hour] = 10;
        stats
    }

    #[test]
    fn empty_history_is_near_neutral() {
        let factor = evaluate(&config(), &Lookup::Known(LoginStats::default()), Utc::now());
        assert!((factor.score - NO_HISTORY_SCORE).abs() < f64::EPSILON);
    }

    #[test]
    fn typical_hour_scores_zero() {
        let now = Utc::now();
        let stats = stats_with_typical_hour(now.hour() as usize);
        let factor = evaluate(&config(), &Lookup::Known(stats), now);
        assert!(factor.score.abs() < f64::EPSILON);
    }

    #[test]
    fn atypical_hour_carries_penalty() {
        let now = Utc::now();
        let other_hour = (now.hour() as usize + 12) % 24;
        let stats = stats_with_typical_hour(other_hour);
        let factor = evaluate(&config(), &Lookup::Known(stats), now);
        assert!((factor.score - ATYPICAL_HOUR_PENALTY).abs() < f64::EPSILON);
    }

    #[test]
    fn login_and_password_churn_penalties_stack() {
        let now = Utc::now();
        let mut stats = stats_with_typical_hour(now.hour() as usize);
        stats.logins_last_day = config().max_daily_logins + 1;
        stats.password_changes_last_week = config().max_weekly_password_changes + 1;

        let factor = evaluate(&config(), &Lookup::Known(stats), now);
        assert!(
            (factor.score - (EXCESSIVE_LOGINS_PENALTY + PASSWORD_CHURN_PENALTY)).abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn failed_lookup_degrades_to_neutral() {
        let factor = evaluate(&config(), &Lookup::Failed, Utc::now());
        assert!((factor.score - UNAVAILABLE_SCORE).abs() < f64::EPSILON);
    }
}
