//! Mock reputation provider.

use super::lock;
use crate::error::{AuthError, Result};
use crate::providers::{DomainReputation, IpReputation, ReputationProvider};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    ips: HashMap<IpAddr, IpReputation>,
    domains: HashMap<String, DomainReputation>,
    failing: bool,
}

/// In-memory reputation provider for testing.
///
/// Unknown addresses and domains resolve to clean verdicts.
#[derive(Clone, Default)]
pub struct MockReputationProvider {
    state: Arc<Mutex<State>>,
}

impl MockReputationProvider {
    /// Create a provider that reports everything clean.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a verdict for an address.
    ///
    /// # Errors
    ///
    /// Returns error if the state lock is poisoned.
    pub fn set_ip(&self, ip: IpAddr, reputation: IpReputation) -> Result<()> {
        lock(&self.state)?.ips.insert(ip, reputation);
        Ok(())
    }

    /// Seed a verdict for a domain.
    ///
    /// # Errors
    ///
    /// Returns error if the state lock is poisoned.
    pub fn set_domain(&self, domain: &str, reputation: DomainReputation) -> Result<()> {
        lock(&self.state)?
            .domains
            .insert(domain.to_lowercase(), reputation);
        Ok(())
    }

    /// Make every lookup fail, to exercise graceful degradation.
    ///
    /// # Errors
    ///
    /// Returns error if the state lock is poisoned.
    pub fn set_failing(&self, failing: bool) -> Result<()> {
        lock(&self.state)?.failing = failing;
        Ok(())
    }
}

impl ReputationProvider for MockReputationProvider {
    async fn ip_reputation(&self, ip_address: IpAddr) -> Result<IpReputation> {
        let state = lock(&self.state)?;
        if state.failing {
            return Err(AuthError::StorageUnavailable("mock failure".into()));
        }
        Ok(state.ips.get(&ip_address).copied().unwrap_or_default())
    }

    async fn domain_reputation(&self, domain: &str) -> Result<DomainReputation> {
        let state = lock(&self.state)?;
        if state.failing {
            return Err(AuthError::StorageUnavailable("mock failure".into()));
        }
        Ok(state
            .domains
            .get(&domain.to_lowercase())
            .copied()
            .unwrap_or_default())
    }
}
