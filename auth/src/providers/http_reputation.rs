//! HTTP reputation service client.
//!
//! Queries a reputation feed per assessment. The service may cache;
//! this client never does — the risk engine treats each verdict as
//! current.

use crate::error::{AuthError, Result};
use crate::providers::{DomainReputation, IpReputation, ReputationProvider};
use std::net::IpAddr;

/// Reputation provider backed by an HTTP service.
#[derive(Clone)]
pub struct HttpReputationProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpReputationProvider {
    /// Create a client for a reputation service.
    #[must_use]
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}/{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AuthError::StorageUnavailable(format!("reputation lookup: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::StorageUnavailable(format!(
                "reputation service returned {}",
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AuthError::SerializationError(e.to_string()))
    }
}

impl ReputationProvider for HttpReputationProvider {
    async fn ip_reputation(&self, ip_address: IpAddr) -> Result<IpReputation> {
        self.get_json(&format!("ip/{ip_address}")).await
    }

    async fn domain_reputation(&self, domain: &str) -> Result<DomainReputation> {
        self.get_json(&format!("domain/{domain}")).await
    }
}
