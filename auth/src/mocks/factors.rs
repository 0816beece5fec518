//! Mock enrolled factor repository.

use super::lock;
use crate::error::Result;
use crate::providers::{FactorMaterial, FactorRepository};
use crate::state::{EnrolledFactor, FactorId, FactorType, UserId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory factor repository for testing.
#[derive(Clone, Default)]
pub struct MockFactorRepository {
    state: Arc<Mutex<HashMap<UserId, Vec<(EnrolledFactor, FactorMaterial)>>>>,
}

impl MockFactorRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FactorRepository for MockFactorRepository {
    async fn list(&self, user_id: UserId) -> Result<Vec<EnrolledFactor>> {
        let state = lock(&self.state)?;
        Ok(state
            .get(&user_id)
            .map(|entries| entries.iter().map(|(f, _)| f.clone()).collect())
            .unwrap_or_default())
    }

    async fn insert(
        &self,
        user_id: UserId,
        factor: &EnrolledFactor,
        material: &FactorMaterial,
    ) -> Result<()> {
        let mut state = lock(&self.state)?;
        let entries = state.entry(user_id).or_default();
        // One enrollment per factor type: replace any previous one.
        entries.retain(|(f, _)| f.factor_type != factor.factor_type);
        entries.push((factor.clone(), material.clone()));
        Ok(())
    }

    async fn material(
        &self,
        user_id: UserId,
        factor_type: FactorType,
    ) -> Result<Option<(FactorId, FactorMaterial)>> {
        let state = lock(&self.state)?;
        Ok(state.get(&user_id).and_then(|entries| {
            entries
                .iter()
                .find(|(f, _)| f.factor_type == factor_type)
                .map(|(f, m)| (f.factor_id, m.clone()))
        }))
    }

    async fn remove(&self, user_id: UserId, factor_id: FactorId) -> Result<bool> {
        let mut state = lock(&self.state)?;
        let Some(entries) = state.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|(f, _)| f.factor_id != factor_id);
        Ok(entries.len() < before)
    }

    async fn touch(
        &self,
        user_id: UserId,
        factor_id: FactorId,
        used_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = lock(&self.state)?;
        if let Some(entries) = state.get_mut(&user_id) {
            if let Some((factor, _)) = entries.iter_mut().find(|(f, _)| f.factor_id == factor_id) {
                factor.last_used_at = Some(used_at);
            }
        }
        Ok(())
    }

    async fn update_counter(
        &self,
        user_id: UserId,
        factor_id: FactorId,
        counter: u32,
    ) -> Result<()> {
        let mut state = lock(&self.state)?;
        if let Some(entries) = state.get_mut(&user_id) {
            if let Some((_, material)) =
                entries.iter_mut().find(|(f, _)| f.factor_id == factor_id)
            {
                if let FactorMaterial::WebAuthn {
                    counter: stored, ..
                } = material
                {
                    *stored = counter;
                }
            }
        }
        Ok(())
    }
}
