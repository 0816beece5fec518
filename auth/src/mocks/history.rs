//! Mock historical signal repository.
//!
//! Windows are computed against the `now` passed to `login_stats`, so
//! tests control time explicitly and assessments stay deterministic.

use super::lock;
use crate::error::{AuthError, Result};
use crate::providers::{DeviceHistory, HistoryRepository, LocationStamp, LoginStats};
use crate::state::UserId;
use chrono::{DateTime, Duration, Timelike, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct LoginRecord {
    at: DateTime<Utc>,
    ip: std::net::IpAddr,
    success: bool,
}

#[derive(Default)]
struct State {
    devices: HashMap<(UserId, String), DeviceHistory>,
    locations: HashMap<UserId, Vec<LocationStamp>>,
    logins: HashMap<UserId, Vec<LoginRecord>>,
    password_changes: HashMap<UserId, Vec<DateTime<Utc>>>,
    failing: bool,
}

/// In-memory history repository for testing.
#[derive(Clone, Default)]
pub struct MockHistoryRepository {
    state: Arc<Mutex<State>>,
}

impl MockHistoryRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
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

    /// Seed a password change for the behavioral window.
    ///
    /// # Errors
    ///
    /// Returns error if the state lock is poisoned.
    pub fn record_password_change(&self, user_id: UserId, at: DateTime<Utc>) -> Result<()> {
        lock(&self.state)?
            .password_changes
            .entry(user_id)
            .or_default()
            .push(at);
        Ok(())
    }

    fn check(state: &State) -> Result<()> {
        if state.failing {
            return Err(AuthError::StorageUnavailable("mock failure".into()));
        }
        Ok(())
    }
}

impl HistoryRepository for MockHistoryRepository {
    async fn device_seen(&self, user_id: UserId, fingerprint: &str) -> Result<Option<DeviceHistory>> {
        let state = lock(&self.state)?;
        Self::check(&state)?;
        Ok(state.devices.get(&(user_id, fingerprint.to_string())).cloned())
    }

    async fn record_device(
        &self,
        user_id: UserId,
        fingerprint: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = lock(&self.state)?;
        state
            .devices
            .entry((user_id, fingerprint.to_string()))
            .and_modify(|h| h.last_seen = seen_at)
            .or_insert(DeviceHistory {
                first_seen: seen_at,
                last_seen: seen_at,
            });
        Ok(())
    }

    async fn known_countries(&self, user_id: UserId) -> Result<Vec<String>> {
        let state = lock(&self.state)?;
        Self::check(&state)?;
        let mut seen = HashSet::new();
        Ok(state
            .locations
            .get(&user_id)
            .map(|stamps| {
                stamps
                    .iter()
                    .filter(|s| seen.insert(s.country.clone()))
                    .map(|s| s.country.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn last_location(&self, user_id: UserId) -> Result<Option<LocationStamp>> {
        let state = lock(&self.state)?;
        Self::check(&state)?;
        Ok(state
            .locations
            .get(&user_id)
            .and_then(|stamps| stamps.iter().max_by_key(|s| s.seen_at).cloned()))
    }

    async fn record_location(&self, user_id: UserId, stamp: &LocationStamp) -> Result<()> {
        lock(&self.state)?
            .locations
            .entry(user_id)
            .or_default()
            .push(stamp.clone());
        Ok(())
    }

    async fn login_stats(&self, user_id: UserId, now: DateTime<Utc>) -> Result<LoginStats> {
        let state = lock(&self.state)?;
        Self::check(&state)?;

        let mut stats = LoginStats::default();
        if let Some(records) = state.logins.get(&user_id) {
            let day_ago = now - Duration::hours(24);
            let half_hour_ago = now - Duration::minutes(30);
            let hour_ago = now - Duration::hours(1);

            let mut ips = HashSet::new();
            for record in records {
                if record.success {
                    let hour = record.at.hour() as usize;
                    stats.hour_histogram[hour] += 1;
                    if record.at > day_ago && record.at <= now {
                        stats.logins_last_day += 1;
                    }
                } else if record.at > half_hour_ago && record.at <= now {
                    stats.failures_last_half_hour += 1;
                }
                if record.at > hour_ago && record.at <= now {
                    ips.insert(record.ip);
                }
            }
            #[allow(clippy::cast_possible_truncation)]
            {
                stats.distinct_ips_last_hour = ips.len() as u32;
            }
        }

        if let Some(changes) = state.password_changes.get(&user_id) {
            let week_ago = now - Duration::days(7);
            #[allow(clippy::cast_possible_truncation)]
            {
                stats.password_changes_last_week = changes
                    .iter()
                    .filter(|&&at| at > week_ago && at <= now)
                    .count() as u32;
            }
        }

        Ok(stats)
    }

    async fn record_login(
        &self,
        user_id: UserId,
        ip_address: std::net::IpAddr,
        success: bool,
        at: DateTime<Utc>,
    ) -> Result<()> {
        lock(&self.state)?
            .logins
            .entry(user_id)
            .or_default()
            .push(LoginRecord {
                at,
                ip: ip_address,
                success,
            });
        Ok(())
    }
}
