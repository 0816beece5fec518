//! PostgreSQL backup code store.

use super::storage_err;
use crate::error::Result;
use crate::providers::{BackupCodeRecord, BackupCodeStore};
use crate::state::UserId;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

/// PostgreSQL-backed backup code store.
///
/// Consumption is a conditional `UPDATE ... WHERE used = false`; the
/// row count tells which concurrent caller won.
#[derive(Clone)]
pub struct PostgresBackupCodeStore {
    pool: PgPool,
}

impl PostgresBackupCodeStore {
    /// Create a store over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl BackupCodeStore for PostgresBackupCodeStore {
    async fn replace_batch(&self, user_id: UserId, batch: Vec<BackupCodeRecord>) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_err("backup tx", e))?;

        // Batches never overlap: every unused code dies with the old
        // batch, consumed ones stay as history.
        sqlx::query("DELETE FROM backup_codes WHERE user_id = $1 AND used = false")
            .bind(user_id.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_err("backup clear", e))?;

        for record in &batch {
            sqlx::query(
                r"
                INSERT INTO backup_codes
                    (code_id, user_id, code_hash, used, created_at, used_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(record.code_id)
            .bind(user_id.0)
            .bind(&record.code_hash)
            .bind(record.used)
            .bind(record.created_at)
            .bind(record.used_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_err("backup insert", e))?;
        }

        tx.commit().await.map_err(|e| storage_err("backup commit", e))
    }

    async fn unused(&self, user_id: UserId) -> Result<Vec<BackupCodeRecord>> {
        let rows = sqlx::query(
            r"
            SELECT code_id, user_id, code_hash, used, created_at, used_at
            FROM backup_codes
            WHERE user_id = $1 AND used = false
            ",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("backup unused", e))?;

        rows.iter()
            .map(|row| {
                Ok(BackupCodeRecord {
                    code_id: row
                        .try_get("code_id")
                        .map_err(|e| storage_err("code id column", e))?,
                    user_id: UserId(
                        row.try_get("user_id")
                            .map_err(|e| storage_err("user id column", e))?,
                    ),
                    code_hash: row
                        .try_get("code_hash")
                        .map_err(|e| storage_err("code hash column", e))?,
                    used: row
                        .try_get("used")
                        .map_err(|e| storage_err("used column", e))?,
                    created_at: row
                        .try_get("created_at")
                        .map_err(|e| storage_err("created_at column", e))?,
                    used_at: row
                        .try_get("used_at")
                        .map_err(|e| storage_err("used_at column", e))?,
                })
            })
            .collect()
    }

    async fn consume(
        &self,
        user_id: UserId,
        code_id: uuid::Uuid,
        used_at: DateTime<Utc>,
    ) -> Result<bool> {
        // Atomic test-and-set: exactly one concurrent caller flips the
        // flag.
        let result = sqlx::query(
            r"
            UPDATE backup_codes
            SET used = true, used_at = $3
            WHERE user_id = $1 AND code_id = $2 AND used = false
            ",
        )
        .bind(user_id.0)
        .bind(code_id)
        .bind(used_at)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("backup consume", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_unused(&self, user_id: UserId) -> Result<u32> {
        let row =
            sqlx::query("SELECT count(*) AS remaining FROM backup_codes WHERE user_id = $1 AND used = false")
                .bind(user_id.0)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| storage_err("backup count", e))?;

        let count: i64 = row
            .try_get("remaining")
            .map_err(|e| storage_err("remaining column", e))?;
        Ok(u32::try_from(count).unwrap_or(0))
    }
}
