//! PostgreSQL user repository.

use super::storage_err;
use crate::error::{AuthError, Result};
use crate::policy::MfaPolicy;
use crate::providers::{UserRecord, UserRepository};
use crate::state::UserId;
use sqlx::{PgPool, Row};

/// PostgreSQL-backed user repository.
#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Create a repository over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<UserRecord> {
        let policy: serde_json::Value = row
            .try_get("policy")
            .map_err(|e| storage_err("user policy column", e))?;
        let org_policy: serde_json::Value = row
            .try_get("org_policy")
            .map_err(|e| storage_err("org policy column", e))?;

        Ok(UserRecord {
            user_id: UserId(
                row.try_get("user_id")
                    .map_err(|e| storage_err("user id column", e))?,
            ),
            email: row
                .try_get("email")
                .map_err(|e| storage_err("email column", e))?,
            password_hash: row
                .try_get("password_hash")
                .map_err(|e| storage_err("password hash column", e))?,
            policy: serde_json::from_value::<MfaPolicy>(policy)
                .map_err(|e| AuthError::SerializationError(e.to_string()))?,
            org_policy: serde_json::from_value::<MfaPolicy>(org_policy)
                .map_err(|e| AuthError::SerializationError(e.to_string()))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| storage_err("created_at column", e))?,
        })
    }
}

const SELECT_USER: &str = r"
    SELECT user_id, email, password_hash, policy, org_policy, created_at
    FROM users
";

impl UserRepository for PostgresUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(&format!("{SELECT_USER} WHERE lower(email) = lower($1)"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_err("user by email", e))?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        let row = sqlx::query(&format!("{SELECT_USER} WHERE user_id = $1"))
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_err("user by id", e))?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn password_history(&self, user_id: UserId, limit: usize) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r"
            SELECT password_hash FROM (
                SELECT password_hash, now() AS changed_at FROM users WHERE user_id = $1
                UNION ALL
                SELECT password_hash, changed_at FROM password_history WHERE user_id = $1
            ) hashes
            ORDER BY changed_at DESC
            LIMIT $2
            ",
        )
        .bind(user_id.0)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("password history", e))?;

        rows.iter()
            .map(|row| {
                row.try_get("password_hash")
                    .map_err(|e| storage_err("password hash column", e))
            })
            .collect()
    }

    async fn update_password(&self, user_id: UserId, password_hash: &str) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_err("password tx", e))?;

        sqlx::query(
            r"
            INSERT INTO password_history (user_id, password_hash, changed_at)
            SELECT user_id, password_hash, now() FROM users WHERE user_id = $1
            ",
        )
        .bind(user_id.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| storage_err("password history insert", e))?;

        sqlx::query("UPDATE users SET password_hash = $2 WHERE user_id = $1")
            .bind(user_id.0)
            .bind(password_hash)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_err("password update", e))?;

        tx.commit().await.map_err(|e| storage_err("password commit", e))
    }
}
