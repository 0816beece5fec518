//! PostgreSQL enrolled factor repository.

use super::storage_err;
use crate::error::{AuthError, Result};
use crate::providers::{FactorMaterial, FactorRepository};
use crate::state::{EnrolledFactor, FactorId, FactorType, UserId};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

/// PostgreSQL-backed enrolled factor repository.
///
/// Secret material is stored as JSONB in the `material` column; TOTP
/// secrets inside it are already sealed before they reach this layer.
#[derive(Clone)]
pub struct PostgresFactorRepository {
    pool: PgPool,
}

impl PostgresFactorRepository {
    /// Create a repository over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn factor_from_row(row: &sqlx::postgres::PgRow) -> Result<EnrolledFactor> {
        let factor_type: serde_json::Value = row
            .try_get("factor_type")
            .map_err(|e| storage_err("factor type column", e))?;
        Ok(EnrolledFactor {
            factor_id: FactorId(
                row.try_get("factor_id")
                    .map_err(|e| storage_err("factor id column", e))?,
            ),
            factor_type: serde_json::from_value(factor_type)
                .map_err(|e| AuthError::SerializationError(e.to_string()))?,
            display_name: row
                .try_get("display_name")
                .map_err(|e| storage_err("display name column", e))?,
            primary: row
                .try_get("is_primary")
                .map_err(|e| storage_err("primary column", e))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| storage_err("created_at column", e))?,
            last_used_at: row
                .try_get("last_used_at")
                .map_err(|e| storage_err("last_used_at column", e))?,
        })
    }
}

impl FactorRepository for PostgresFactorRepository {
    async fn list(&self, user_id: UserId) -> Result<Vec<EnrolledFactor>> {
        let rows = sqlx::query(
            r"
            SELECT factor_id, factor_type, display_name, is_primary, created_at, last_used_at
            FROM enrolled_factors
            WHERE user_id = $1
            ORDER BY created_at
            ",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("factor list", e))?;

        rows.iter().map(Self::factor_from_row).collect()
    }

    async fn insert(
        &self,
        user_id: UserId,
        factor: &EnrolledFactor,
        material: &FactorMaterial,
    ) -> Result<()> {
        let factor_type = serde_json::to_value(factor.factor_type)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;
        let material = serde_json::to_value(material)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_err("factor tx", e))?;

        // One enrollment per factor type: replace any previous one.
        sqlx::query("DELETE FROM enrolled_factors WHERE user_id = $1 AND factor_type = $2")
            .bind(user_id.0)
            .bind(&factor_type)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_err("factor replace", e))?;

        sqlx::query(
            r"
            INSERT INTO enrolled_factors
                (factor_id, user_id, factor_type, display_name, is_primary,
                 material, created_at, last_used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(factor.factor_id.0)
        .bind(user_id.0)
        .bind(&factor_type)
        .bind(&factor.display_name)
        .bind(factor.primary)
        .bind(material)
        .bind(factor.created_at)
        .bind(factor.last_used_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| storage_err("factor insert", e))?;

        tx.commit().await.map_err(|e| storage_err("factor commit", e))
    }

    async fn material(
        &self,
        user_id: UserId,
        factor_type: FactorType,
    ) -> Result<Option<(FactorId, FactorMaterial)>> {
        let factor_type = serde_json::to_value(factor_type)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;

        let row = sqlx::query(
            r"
            SELECT factor_id, material
            FROM enrolled_factors
            WHERE user_id = $1 AND factor_type = $2
            ",
        )
        .bind(user_id.0)
        .bind(factor_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_err("factor material", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let material: serde_json::Value = row
            .try_get("material")
            .map_err(|e| storage_err("material column", e))?;
        Ok(Some((
            FactorId(
                row.try_get("factor_id")
                    .map_err(|e| storage_err("factor id column", e))?,
            ),
            serde_json::from_value(material)
                .map_err(|e| AuthError::SerializationError(e.to_string()))?,
        )))
    }

    async fn remove(&self, user_id: UserId, factor_id: FactorId) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM enrolled_factors WHERE user_id = $1 AND factor_id = $2")
                .bind(user_id.0)
                .bind(factor_id.0)
                .execute(&self.pool)
                .await
                .map_err(|e| storage_err("factor remove", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn touch(
        &self,
        user_id: UserId,
        factor_id: FactorId,
        used_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE enrolled_factors SET last_used_at = $3 WHERE user_id = $1 AND factor_id = $2",
        )
        .bind(user_id.0)
        .bind(factor_id.0)
        .bind(used_at)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("factor touch", e))?;
        Ok(())
    }

    async fn update_counter(
        &self,
        user_id: UserId,
        factor_id: FactorId,
        counter: u32,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE enrolled_factors
            SET material = jsonb_set(material, '{WebAuthn,counter}', to_jsonb($3::bigint))
            WHERE user_id = $1 AND factor_id = $2
            ",
        )
        .bind(user_id.0)
        .bind(factor_id.0)
        .bind(i64::from(counter))
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("counter update", e))?;
        Ok(())
    }
}
