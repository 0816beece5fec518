//! PostgreSQL repositories for durable records.
//!
//! Users, enrolled factors, backup codes, historical signals and the
//! audit trail. Queries use runtime binding (no compile-time database
//! dependency); atomic transitions are conditional `UPDATE`s checked
//! via `rows_affected`.
//!
//! # Schema
//!
//! Expected tables (see deployment migrations):
//! `users`, `password_history`, `enrolled_factors`, `backup_codes`,
//! `device_history`, `location_history`, `login_history`,
//! `audit_events`.

mod backup_codes;
mod factors;
mod history;
mod users;

pub use backup_codes::PostgresBackupCodeStore;
pub use factors::PostgresFactorRepository;
pub use history::PostgresHistoryRepository;
pub use users::PostgresUserRepository;

use crate::error::AuthError;
use crate::providers::{AuditEvent, AuditLog};
use sqlx::PgPool;

/// Map a sqlx error to the storage error surface.
pub(crate) fn storage_err(context: &str, error: sqlx::Error) -> AuthError {
    AuthError::StorageUnavailable(format!("{context}: {error}"))
}

/// PostgreSQL append-only audit log.
#[derive(Clone)]
pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    /// Create a log over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl AuditLog for PostgresAuditLog {
    async fn record(&self, event: AuditEvent) -> crate::error::Result<()> {
        let kind = serde_json::to_value(event.kind)
            .ok()
            .and_then(|v| v.as_str().map(ToString::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        sqlx::query(
            r"
            INSERT INTO audit_events (kind, user_id, ip_address, success, detail, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(kind)
        .bind(event.user_id.map(|u| u.0))
        .bind(event.ip_address.map(|ip| ip.to_string()))
        .bind(event.success)
        .bind(event.detail)
        .bind(event.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("audit insert", e))?;

        Ok(())
    }
}
