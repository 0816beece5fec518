//! Device recognition sub-assessment.

use super::{Lookup, RiskFactor, UNAVAILABLE_SCORE};
use crate::config::RiskConfig;
use crate::providers::DeviceHistory;
use chrono::{DateTime, Utc};
use serde_json::json;

/// Fixed baseline for identities that could not be resolved.
const NEW_USER_BASELINE: f64 = 40.0;

/// Penalty for a fingerprint never seen for this user.
const UNKNOWN_DEVICE_PENALTY: f64 = 60.0;

/// Penalty for a device known for less than the configured age.
const NEW_DEVICE_PENALTY: f64 = 30.0;

/// Penalty for a device the user explicitly marked untrusted.
const UNTRUSTED_PENALTY: f64 = 25.0;

pub(crate) fn evaluate(
    config: &RiskConfig,
    user_known: bool,
    history: &Lookup<Option<DeviceHistory>>,
    untrusted: bool,
    now: DateTime<Utc>,
) -> RiskFactor {
    let weight = config.device_weight;

    if !user_known {
        return RiskFactor {
            name: "device",
            score: NEW_USER_BASELINE,
            weight,
            evidence: json!({ "reason": "unknown_identity" }),
        };
    }

    let (mut score, mut evidence) = match history {
        Lookup::Failed => {
            return RiskFactor {
                name: "device",
                score: UNAVAILABLE_SCORE,
                weight,
                evidence: json!({ "signal": "unavailable" }),
            };
        }
        Lookup::Known(None) => (
            UNKNOWN_DEVICE_PENALTY,
            json!({ "known_device": false }),
        ),
        Lookup::Known(Some(seen)) => {
            let age = now - seen.first_seen;
            if age < config.new_device_age {
                (
                    NEW_DEVICE_PENALTY,
                    json!({ "known_device": true, "device_age_hours": age.num_hours() }),
                )
            } else {
                (0.0, json!({ "known_device": true }))
            }
        }
    };

    if untrusted {
        score += UNTRUSTED_PENALTY;
        if let Some(map) = evidence.as_object_mut() {
            map.insert("untrusted_flag".into(), json!(true));
        }
    }

    RiskFactor {
        name: "device",
        score: score.min(100.0),
        weight,
        evidence,
    }
}
