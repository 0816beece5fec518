//! IP and domain reputation collaborator trait.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Reputation verdict for a source address.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct IpReputation {
    /// Address belongs to a known VPN egress.
    pub is_vpn: bool,

    /// Address belongs to an open proxy.
    pub is_proxy: bool,

    /// Address is a Tor exit node.
    pub is_tor: bool,

    /// Aggregate threat score (0–100) from the reputation feed.
    pub threat_score: u8,
}

/// Reputation verdict for an email domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct DomainReputation {
    /// Domain is a disposable-address provider.
    pub is_disposable: bool,
}

/// IP/domain reputation collaborator.
///
/// Queried synchronously per risk assessment. Caching, if any, is the
/// collaborator's concern — the core never caches verdicts.
pub trait ReputationProvider: Send + Sync {
    /// Look up reputation for a source address.
    ///
    /// # Errors
    ///
    /// Returns error if the reputation service is unreachable; the risk
    /// engine degrades the signal rather than failing the assessment.
    fn ip_reputation(
        &self,
        ip_address: IpAddr,
    ) -> impl std::future::Future<Output = Result<IpReputation>> + Send;

    /// Look up reputation for an email domain.
    ///
    /// # Errors
    ///
    /// Returns error if the reputation service is unreachable.
    fn domain_reputation(
        &self,
        domain: &str,
    ) -> impl std::future::Future<Output = Result<DomainReputation>> + Send;
}
