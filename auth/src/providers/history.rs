//! Historical signal repository trait.
//!
//! The risk engine is a pure function of the request context plus these
//! lookups. All counters are computed against rolling time windows at
//! query time — no in-process counters — so every service instance
//! observes consistent state.

use crate::error::Result;
use crate::state::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// What the store knows about a device fingerprint for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceHistory {
    /// When the fingerprint was first recorded for the user.
    pub first_seen: DateTime<Utc>,

    /// When the fingerprint was last seen.
    pub last_seen: DateTime<Utc>,
}

/// A recorded login location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationStamp {
    /// Country code (ISO 3166-1 alpha-2).
    pub country: String,

    /// When the login from this location happened.
    pub seen_at: DateTime<Utc>,
}

/// Rolling-window login statistics for one user, computed at query
/// time against `now`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginStats {
    /// Successful logins in the trailing 24 hours.
    pub logins_last_day: u32,

    /// Failed attempts in the trailing 30 minutes.
    pub failures_last_half_hour: u32,

    /// Distinct source addresses in the trailing hour.
    pub distinct_ips_last_hour: u32,

    /// Password changes in the trailing 7 days.
    pub password_changes_last_week: u32,

    /// Successful login count per hour-of-day over recent history.
    pub hour_histogram: [u32; 24],
}

impl Default for LoginStats {
    fn default() -> Self {
        Self {
            logins_last_day: 0,
            failures_last_half_hour: 0,
            distinct_ips_last_hour: 0,
            password_changes_last_week: 0,
            hour_histogram: [0; 24],
        }
    }
}

/// Historical signal repository.
///
/// Range queries filtered by user id and time window, backed by the
/// storage collaborator.
pub trait HistoryRepository: Send + Sync {
    /// Look up a device fingerprint for the user.
    ///
    /// # Errors
    ///
    /// Returns error only on storage failure; an unknown fingerprint is
    /// `Ok(None)`.
    fn device_seen(
        &self,
        user_id: UserId,
        fingerprint: &str,
    ) -> impl std::future::Future<Output = Result<Option<DeviceHistory>>> + Send;

    /// Record (or refresh) a device fingerprint sighting.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn record_device(
        &self,
        user_id: UserId,
        fingerprint: &str,
        seen_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Countries the user has logged in from before.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn known_countries(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;

    /// The single most recent recorded location.
    ///
    /// # Errors
    ///
    /// Returns error only on storage failure.
    fn last_location(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<Option<LocationStamp>>> + Send;

    /// Record a login location.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn record_location(
        &self,
        user_id: UserId,
        stamp: &LocationStamp,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Rolling-window statistics at `now`.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn login_stats(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<LoginStats>> + Send;

    /// Record a login attempt (success or failure) for future windows.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn record_login(
        &self,
        user_id: UserId,
        ip_address: IpAddr,
        success: bool,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
