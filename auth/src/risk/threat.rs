//! Threat-intelligence sub-assessment.

use super::{Lookup, RiskFactor, UNAVAILABLE_SCORE};
use crate::config::RiskConfig;
use crate::providers::{DomainReputation, IpReputation};
use serde_json::json;

/// Penalty for VPN egress addresses.
const VPN_PENALTY: f64 = 25.0;

/// Penalty for open proxies.
const PROXY_PENALTY: f64 = 25.0;

/// Penalty for Tor exit nodes.
const TOR_PENALTY: f64 = 40.0;

/// Feed threat score at or above this adds the feed penalty.
const THREAT_SCORE_THRESHOLD: u8 = 50;

/// Penalty when the feed's threat score crosses the threshold.
const THREAT_SCORE_PENALTY: f64 = 30.0;

/// Penalty for disposable email domains.
const DISPOSABLE_DOMAIN_PENALTY: f64 = 20.0;

pub(crate) fn evaluate(
    config: &RiskConfig,
    ip: &Lookup<IpReputation>,
    domain: &Lookup<Option<DomainReputation>>,
) -> RiskFactor {
    let weight = config.threat_weight;

    let Lookup::Known(ip) = ip else {
        return RiskFactor {
            name: "threat_intel",
            score: UNAVAILABLE_SCORE,
            weight,
            evidence: json!({ "signal": "unavailable" }),
        };
    };

    let mut score = 0.0;
    let mut evidence = json!({});
    let notes = |evidence: &mut serde_json::Value, key: &str, value: serde_json::Value| {
        if let Some(map) = evidence.as_object_mut() {
            map.insert(key.into(), value);
        }
    };

    if ip.is_vpn {
        score += VPN_PENALTY;
        notes(&mut evidence, "vpn", json!(true));
    }
    if ip.is_proxy {
        score += PROXY_PENALTY;
        notes(&mut evidence, "proxy", json!(true));
    }
    if ip.is_tor {
        score += TOR_PENALTY;
        notes(&mut evidence, "tor", json!(true));
    }
    if ip.threat_score >= THREAT_SCORE_THRESHOLD {
        score += THREAT_SCORE_PENALTY;
        notes(&mut evidence, "threat_score", json!(ip.threat_score));
    }

    match domain {
        Lookup::Known(Some(rep)) if rep.is_disposable => {
            score += DISPOSABLE_DOMAIN_PENALTY;
            notes(&mut evidence, "disposable_domain", json!(true));
        }
        Lookup::Known(_) => {}
        Lookup::Failed => {
            // IP verdict still stands; mark the domain side degraded.
            score = score.max(UNAVAILABLE_SCORE);
            notes(&mut evidence, "domain_signal", json!("unavailable"));
        }
    }

    RiskFactor {
        name: "threat_intel",
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
    fn clean_address_scores_zero() {
        let factor = evaluate(
            &config(),
            &Lookup::Known(IpReputation::default()),
            &Lookup::Known(None),
        );
        assert!(factor.score.abs() < f64::EPSILON);
    }

    #[test]
    fn each_positive_signal_adds_fixed_penalty() {
        let ip = IpReputation {
            is_vpn: true,
            is_proxy: false,
            is_tor: false,
            threat_score: 10,
        };
        let factor = evaluate(&config(), &Lookup::Known(ip), &Lookup::Known(None));
        assert!((factor.score - VPN_PENALTY).abs() < f64::EPSILON);
    }

    #[test]
    fn stacked_signals_cap_at_100() {
        let ip = IpReputation {
            is_vpn: true,
            is_proxy: true,
            is_tor: true,
            threat_score: 90,
        };
        let domain = DomainReputation {
            is_disposable: true,
        };
        let factor = evaluate(&config(), &Lookup::Known(ip), &Lookup::Known(Some(domain)));
        assert!((factor.score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn disposable_domain_alone_is_penalized() {
        let domain = DomainReputation {
            is_disposable: true,
        };
        let factor = evaluate(
            &config(),
            &Lookup::Known(IpReputation::default()),
            &Lookup::Known(Some(domain)),
        );
        assert!((factor.score - DISPOSABLE_DOMAIN_PENALTY).abs() < f64::EPSILON);
    }

    #[test]
    fn failed_ip_lookup_degrades_to_neutral() {
        let factor = evaluate(&config(), &Lookup::Failed, &Lookup::Known(None));
        assert!((factor.score - UNAVAILABLE_SCORE).abs() < f64::EPSILON);
    }
}
