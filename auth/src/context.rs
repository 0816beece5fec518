//! Per-request authentication context.
//!
//! An [`AuthContext`] is constructed for every authentication attempt and
//! never persisted as-is; derived facts (device fingerprints, location
//! stamps, login records) are persisted separately by the history
//! repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Everything the risk engine and orchestrator know about one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Identity hint, when known before primary authentication.
    pub email: Option<String>,

    /// Source network address.
    pub ip_address: IpAddr,

    /// Raw user-agent string.
    pub user_agent: String,

    /// Structured device descriptor collected client-side.
    pub device: DeviceDescriptor,

    /// Resolved coarse geolocation, when the caller's edge resolved it.
    pub location: Option<GeoLocation>,

    /// Event timestamp.
    pub observed_at: DateTime<Utc>,
}

impl AuthContext {
    /// Create a context observed now.
    #[must_use]
    pub fn new(ip_address: IpAddr, user_agent: impl Into<String>, device: DeviceDescriptor) -> Self {
        Self {
            email: None,
            ip_address,
            user_agent: user_agent.into(),
            device,
            location: None,
            observed_at: Utc::now(),
        }
    }

    /// Attach an identity hint.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Attach a resolved location.
    #[must_use]
    pub fn with_location(mut self, location: GeoLocation) -> Self {
        self.location = Some(location);
        self
    }
}

/// Stable client/device attributes used for fingerprinting.
///
/// All fields are optional to support partial collection; the
/// fingerprint hash canonicalizes missing fields so partial descriptors
/// still produce stable fingerprints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeviceDescriptor {
    /// Platform (e.g., "macOS", "iOS 17.2").
    pub platform: Option<String>,

    /// IANA timezone name (e.g., "Europe/Paris").
    pub timezone: Option<String>,

    /// Preferred language (e.g., "en-US").
    pub language: Option<String>,

    /// Screen signature ("widthxheight@depth").
    pub screen: Option<String>,

    /// Explicit trust flag set by the client when the user marked the
    /// device as untrusted (shared/public machine).
    pub untrusted: bool,
}

/// Coarse resolved geolocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Country code (ISO 3166-1 alpha-2).
    pub country: String,

    /// Region/state.
    pub region: Option<String>,

    /// City.
    pub city: Option<String>,

    /// Latitude.
    pub latitude: Option<f64>,

    /// Longitude.
    pub longitude: Option<f64>,
}

impl GeoLocation {
    /// Location with only a country known.
    #[must_use]
    pub fn country(code: impl Into<String>) -> Self {
        Self {
            country: code.into(),
            region: None,
            city: None,
            latitude: None,
            longitude: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn context_builder_attaches_hints() {
        let ctx = AuthContext::new(
            "198.51.100.4".parse().unwrap(),
            "Mozilla/5.0",
            DeviceDescriptor::default(),
        )
        .with_email("user@example.com")
        .with_location(GeoLocation::country("FR"));

        assert_eq!(ctx.email.as_deref(), Some("user@example.com"));
        assert_eq!(ctx.location.unwrap().country, "FR");
    }
}
