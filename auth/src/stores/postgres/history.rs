//! PostgreSQL historical signal repository.
//!
//! Rolling-window counters are computed in SQL against the `now`
//! passed by the risk engine, so windows are consistent across service
//! instances and deterministic for a fixed dataset.

use super::storage_err;
use crate::error::Result;
use crate::providers::{DeviceHistory, HistoryRepository, LocationStamp, LoginStats};
use crate::state::UserId;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use std::net::IpAddr;

/// PostgreSQL-backed history repository.
#[derive(Clone)]
pub struct PostgresHistoryRepository {
    pool: PgPool,
}

impl PostgresHistoryRepository {
    /// Create a repository over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl HistoryRepository for PostgresHistoryRepository {
    async fn device_seen(
        &self,
        user_id: UserId,
        fingerprint: &str,
    ) -> Result<Option<DeviceHistory>> {
        let row = sqlx::query(
            r"
            SELECT first_seen, last_seen
            FROM device_history
            WHERE user_id = $1 AND fingerprint = $2
            ",
        )
        .bind(user_id.0)
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_err("device lookup", e))?;

        row.map(|row| {
            Ok(DeviceHistory {
                first_seen: row
                    .try_get("first_seen")
                    .map_err(|e| storage_err("first_seen column", e))?,
                last_seen: row
                    .try_get("last_seen")
                    .map_err(|e| storage_err("last_seen column", e))?,
            })
        })
        .transpose()
    }

    async fn record_device(
        &self,
        user_id: UserId,
        fingerprint: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO device_history (user_id, fingerprint, first_seen, last_seen)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (user_id, fingerprint)
            DO UPDATE SET last_seen = EXCLUDED.last_seen
            ",
        )
        .bind(user_id.0)
        .bind(fingerprint)
        .bind(seen_at)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("device record", e))?;
        Ok(())
    }

    async fn known_countries(&self, user_id: UserId) -> Result<Vec<String>> {
        let rows =
            sqlx::query("SELECT DISTINCT country FROM location_history WHERE user_id = $1")
                .bind(user_id.0)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| storage_err("country lookup", e))?;

        rows.iter()
            .map(|row| {
                row.try_get("country")
                    .map_err(|e| storage_err("country column", e))
            })
            .collect()
    }

    async fn last_location(&self, user_id: UserId) -> Result<Option<LocationStamp>> {
        let row = sqlx::query(
            r"
            SELECT country, seen_at
            FROM location_history
            WHERE user_id = $1
            ORDER BY seen_at DESC
            LIMIT 1
            ",
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_err("location lookup", e))?;

        row.map(|row| {
            Ok(LocationStamp {
                country: row
                    .try_get("country")
                    .map_err(|e| storage_err("country column", e))?,
                seen_at: row
                    .try_get("seen_at")
                    .map_err(|e| storage_err("seen_at column", e))?,
            })
        })
        .transpose()
    }

    async fn record_location(&self, user_id: UserId, stamp: &LocationStamp) -> Result<()> {
        sqlx::query("INSERT INTO location_history (user_id, country, seen_at) VALUES ($1, $2, $3)")
            .bind(user_id.0)
            .bind(&stamp.country)
            .bind(stamp.seen_at)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("location record", e))?;
        Ok(())
    }

    async fn login_stats(&self, user_id: UserId, now: DateTime<Utc>) -> Result<LoginStats> {
        let row = sqlx::query(
            r"
            SELECT
                count(*) FILTER (WHERE success AND at > $2)                      AS logins_last_day,
                count(*) FILTER (WHERE NOT success AND at > $3)                  AS failures_last_half_hour,
                count(DISTINCT ip_address) FILTER (WHERE at > $4)                AS distinct_ips_last_hour
            FROM login_history
            WHERE user_id = $1 AND at <= $5
            ",
        )
        .bind(user_id.0)
        .bind(now - Duration::hours(24))
        .bind(now - Duration::minutes(30))
        .bind(now - Duration::hours(1))
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_err("login stats", e))?;

        let mut stats = LoginStats {
            logins_last_day: get_count(&row, "logins_last_day")?,
            failures_last_half_hour: get_count(&row, "failures_last_half_hour")?,
            distinct_ips_last_hour: get_count(&row, "distinct_ips_last_hour")?,
            password_changes_last_week: 0,
            hour_histogram: [0; 24],
        };

        let change_row = sqlx::query(
            "SELECT count(*) AS changes FROM password_history WHERE user_id = $1 AND changed_at > $2",
        )
        .bind(user_id.0)
        .bind(now - Duration::days(7))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_err("password changes", e))?;
        stats.password_changes_last_week = get_count(&change_row, "changes")?;

        let hour_rows = sqlx::query(
            r"
            SELECT extract(hour FROM at)::int AS hour, count(*) AS logins
            FROM login_history
            WHERE user_id = $1 AND success
            GROUP BY 1
            ",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("hour histogram", e))?;

        for row in hour_rows {
            let hour: i32 = row
                .try_get("hour")
                .map_err(|e| storage_err("hour column", e))?;
            if let Ok(index) = usize::try_from(hour) {
                if index < 24 {
                    stats.hour_histogram[index] = get_count(&row, "logins")?;
                }
            }
        }

        Ok(stats)
    }

    async fn record_login(
        &self,
        user_id: UserId,
        ip_address: IpAddr,
        success: bool,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO login_history (user_id, ip_address, success, at) VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id.0)
        .bind(ip_address.to_string())
        .bind(success)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("login record", e))?;
        Ok(())
    }
}

fn get_count(row: &sqlx::postgres::PgRow, column: &str) -> Result<u32> {
    let count: i64 = row
        .try_get(column)
        .map_err(|e| storage_err("count column", e))?;
    Ok(u32::try_from(count).unwrap_or(0))
}
