//! Location and travel-feasibility sub-assessment.

use super::{Lookup, RiskFactor, UNAVAILABLE_SCORE};
use crate::config::RiskConfig;
use crate::context::GeoLocation;
use crate::providers::LocationStamp;
use chrono::{DateTime, Utc};
use serde_json::json;

/// Score when the caller's edge could not resolve a location.
const UNRESOLVED_SCORE: f64 = 20.0;

/// Score for a user with no recorded location history yet.
const NO_HISTORY_SCORE: f64 = 30.0;

/// Penalty for a country never seen for this user.
const UNSEEN_COUNTRY_PENALTY: f64 = 50.0;

/// Penalty for a country change faster than travel allows.
const IMPOSSIBLE_TRAVEL_PENALTY: f64 = 80.0;

/// Penalty for logins from a configured higher-risk country.
const HIGH_RISK_COUNTRY_PENALTY: f64 = 30.0;

pub(crate) fn evaluate(
    config: &RiskConfig,
    location: Option<&GeoLocation>,
    known_countries: &Lookup<Vec<String>>,
    last_location: &Lookup<Option<LocationStamp>>,
    now: DateTime<Utc>,
) -> RiskFactor {
    let weight = config.location_weight;

    let Some(location) = location else {
        return RiskFactor {
            name: "location",
            score: UNRESOLVED_SCORE,
            weight,
            evidence: json!({ "reason": "location_unresolved" }),
        };
    };

    let (Lookup::Known(countries), Lookup::Known(last)) = (known_countries, last_location) else {
        return RiskFactor {
            name: "location",
            score: UNAVAILABLE_SCORE,
            weight,
            evidence: json!({ "signal": "unavailable" }),
        };
    };

    let mut score = 0.0;
    let mut evidence = json!({ "country": location.country });
    let notes = |evidence: &mut serde_json::Value, key: &str| {
        if let Some(map) = evidence.as_object_mut() {
            map.insert(key.into(), json!(true));
        }
    };

    if countries.is_empty() {
        score += NO_HISTORY_SCORE;
        notes(&mut evidence, "no_location_history");
    } else if !countries.iter().any(|c| c == &location.country) {
        score += UNSEEN_COUNTRY_PENALTY;
        notes(&mut evidence, "unseen_country");
    }

    if let Some(last) = last {
        let elapsed = now - last.seen_at;
        if last.country != location.country && elapsed < config.travel_feasibility {
            score += IMPOSSIBLE_TRAVEL_PENALTY;
            if let Some(map) = evidence.as_object_mut() {
                map.insert("impossible_travel".into(), json!(true));
                map.insert("previous_country".into(), json!(last.country));
                map.insert("elapsed_minutes".into(), json!(elapsed.num_minutes()));
            }
        }
    }

    if config
        .high_risk_countries
        .iter()
        .any(|c| c == &location.country)
    {
        score += HIGH_RISK_COUNTRY_PENALTY;
        notes(&mut evidence, "high_risk_country");
    }

    RiskFactor {
        name: "location",
        score: score.min(100.0),
        weight,
        evidence,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn config() -> RiskConfig {
        RiskConfig::default()
    }

    fn fr() -> GeoLocation {
        GeoLocation::country("FR")
    }

    #[test]
    fn unresolved_location_is_mildly_suspicious() {
        let factor = evaluate(
            &config(),
            None,
            &Lookup::Known(vec![]),
            &Lookup::Known(None),
            Utc::now(),
        );
        assert!((factor.score - UNRESOLVED_SCORE).abs() < f64::EPSILON);
    }

    #[test]
    fn known_country_with_history_scores_zero() {
        let factor = evaluate(
            &config(),
            Some(&fr()),
            &Lookup::Known(vec!["FR".into(), "BE".into()]),
            &Lookup::Known(None),
            Utc::now(),
        );
        assert!(factor.score.abs() < f64::EPSILON);
    }

    #[test]
    fn unseen_country_carries_large_penalty() {
        let factor = evaluate(
            &config(),
            Some(&fr()),
            &Lookup::Known(vec!["US".into()]),
            &Lookup::Known(None),
            Utc::now(),
        );
        assert!((factor.score - UNSEEN_COUNTRY_PENALTY).abs() < f64::EPSILON);
        assert_eq!(factor.evidence["unseen_country"], true);
    }

    #[test]
    fn impossible_travel_flags_fast_country_change() {
        let now = Utc::now();
        let last = LocationStamp {
            country: "JP".into(),
            seen_at: now - Duration::minutes(30),
        };
        let factor = evaluate(
            &config(),
            Some(&fr()),
            &Lookup::Known(vec!["FR".into(), "JP".into()]),
            &Lookup::Known(Some(last)),
            now,
        );
        assert!((factor.score - IMPOSSIBLE_TRAVEL_PENALTY).abs() < f64::EPSILON);
        assert_eq!(factor.evidence["impossible_travel"], true);
    }

    #[test]
    fn slow_country_change_is_feasible_travel() {
        let now = Utc::now();
        let last = LocationStamp {
            country: "JP".into(),
            seen_at: now - Duration::hours(14),
        };
        let factor = evaluate(
            &config(),
            Some(&fr()),
            &Lookup::Known(vec!["FR".into(), "JP".into()]),
            &Lookup::Known(Some(last)),
            now,
        );
        assert!(factor.score.abs() < f64::EPSILON);
    }

    #[test]
    fn high_risk_country_penalty_stacks_and_caps() {
        let now = Utc::now();
        let last = LocationStamp {
            country: "FR".into(),
            seen_at: now - Duration::minutes(10),
        };
        let factor = evaluate(
            &config(),
            Some(&GeoLocation::country("KP")),
            &Lookup::Known(vec!["FR".into()]),
            &Lookup::Known(Some(last)),
            now,
        );
        // unseen (50) + impossible travel (80) + high risk (30), capped
        assert!((factor.score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn failed_history_lookup_degrades_to_neutral() {
        let factor = evaluate(
            &config(),
            Some(&fr()),
            &Lookup::Failed,
            &Lookup::Known(None),
            Utc::now(),
        );
        assert!((factor.score - UNAVAILABLE_SCORE).abs() < f64::EPSILON);
    }
}
