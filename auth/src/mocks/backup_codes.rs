//! Mock backup code store.

use super::lock;
use crate::error::Result;
use crate::providers::{BackupCodeRecord, BackupCodeStore};
use crate::state::UserId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory backup code store for testing.
///
/// `consume` is a mutex-atomic test-and-set on the `used` flag, so
/// concurrent submissions of one code admit exactly one success.
#[derive(Clone, Default)]
pub struct MockBackupCodeStore {
    state: Arc<Mutex<HashMap<UserId, Vec<BackupCodeRecord>>>>,
}

impl MockBackupCodeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackupCodeStore for MockBackupCodeStore {
    async fn replace_batch(&self, user_id: UserId, batch: Vec<BackupCodeRecord>) -> Result<()> {
        let mut state = lock(&self.state)?;
        let records = state.entry(user_id).or_default();
        // Consumed codes stay as history; every unused one dies with
        // the old batch.
        records.retain(|r| r.used);
        records.extend(batch);
        Ok(())
    }

    async fn unused(&self, user_id: UserId) -> Result<Vec<BackupCodeRecord>> {
        let state = lock(&self.state)?;
        Ok(state
            .get(&user_id)
            .map(|records| records.iter().filter(|r| !r.used).cloned().collect())
            .unwrap_or_default())
    }

    async fn consume(
        &self,
        user_id: UserId,
        code_id: uuid::Uuid,
        used_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = lock(&self.state)?;
        let Some(records) = state.get_mut(&user_id) else {
            return Ok(false);
        };
        let Some(record) = records.iter_mut().find(|r| r.code_id == code_id) else {
            return Ok(false);
        };
        if record.used {
            return Ok(false);
        }
        record.used = true;
        record.used_at = Some(used_at);
        Ok(true)
    }

    async fn count_unused(&self, user_id: UserId) -> Result<u32> {
        let state = lock(&self.state)?;
        #[allow(clippy::cast_possible_truncation)]
        Ok(state
            .get(&user_id)
            .map(|records| records.iter().filter(|r| !r.used).count() as u32)
            .unwrap_or(0))
    }
}
