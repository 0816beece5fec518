//! HTTP SMS gateway provider.
//!
//! Posts messages to a gateway endpoint; any non-success response is a
//! delivery failure, so the caller never issues a code that was not
//! accepted by the gateway.

use crate::error::{AuthError, Result};
use crate::providers::SmsProvider;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Serialize)]
struct SmsRequest<'a> {
    to: &'a str,
    message: &'a str,
}

/// SMS provider backed by an HTTP gateway.
#[derive(Clone)]
pub struct HttpSmsProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpSmsProvider {
    /// Create a provider posting to `endpoint` with a bearer key.
    #[must_use]
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

impl SmsProvider for HttpSmsProvider {
    async fn send(&self, destination: &str, message: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&SmsRequest {
                to: destination,
                message,
            })
            .send()
            .await
            .map_err(|error| {
                warn!(%error, "SMS gateway unreachable");
                AuthError::DeliveryFailure
            })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "SMS gateway rejected message");
            return Err(AuthError::DeliveryFailure);
        }

        info!("SMS accepted by gateway");
        Ok(())
    }
}

/// Logs SMS deliveries instead of sending them (development).
#[derive(Clone, Debug, Default)]
pub struct ConsoleSmsProvider;

impl ConsoleSmsProvider {
    /// Create a new console SMS provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SmsProvider for ConsoleSmsProvider {
    async fn send(&self, destination: &str, message: &str) -> Result<()> {
        info!(
            to = %destination,
            message = %message,
            "SMS (development mode)"
        );
        Ok(())
    }
}
