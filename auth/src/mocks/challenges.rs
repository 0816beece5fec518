//! Mock challenge store.
//!
//! Mutex serialization makes every mutation an atomic read-modify-write,
//! matching the conditional-update contract of the production store.

use super::lock;
use crate::error::{AuthError, Result};
use crate::providers::ChallengeStore;
use crate::state::{Challenge, ChallengeId, FactorType};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    challenges: HashMap<ChallengeId, Challenge>,
    ceremonies: HashMap<String, (Vec<u8>, DateTime<Utc>)>,
}

/// In-memory challenge store for testing.
#[derive(Clone, Default)]
pub struct MockChallengeStore {
    state: Arc<Mutex<State>>,
}

impl MockChallengeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChallengeStore for MockChallengeStore {
    async fn insert(&self, challenge: &Challenge) -> Result<()> {
        lock(&self.state)?
            .challenges
            .insert(challenge.challenge_id, challenge.clone());
        Ok(())
    }

    async fn fetch(&self, challenge_id: ChallengeId) -> Result<Option<Challenge>> {
        Ok(lock(&self.state)?.challenges.get(&challenge_id).cloned())
    }

    async fn record_failure(&self, challenge_id: ChallengeId) -> Result<u32> {
        let mut state = lock(&self.state)?;
        let challenge = state
            .challenges
            .get_mut(&challenge_id)
            .ok_or(AuthError::ChallengeNotFound)?;
        challenge.failed_attempts += 1;
        Ok(challenge.failed_attempts)
    }

    async fn record_satisfied(
        &self,
        challenge_id: ChallengeId,
        factor_type: FactorType,
    ) -> Result<u32> {
        let mut state = lock(&self.state)?;
        let challenge = state
            .challenges
            .get_mut(&challenge_id)
            .ok_or(AuthError::ChallengeNotFound)?;
        challenge.satisfied.insert(factor_type);
        #[allow(clippy::cast_possible_truncation)]
        Ok(challenge.satisfied.len() as u32)
    }

    async fn remove(&self, challenge_id: ChallengeId) -> Result<bool> {
        Ok(lock(&self.state)?
            .challenges
            .remove(&challenge_id)
            .is_some())
    }

    async fn put_ceremony(&self, key: &str, state_bytes: Vec<u8>, ttl: Duration) -> Result<()> {
        lock(&self.state)?
            .ceremonies
            .insert(key.to_string(), (state_bytes, Utc::now() + ttl));
        Ok(())
    }

    async fn take_ceremony(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut state = lock(&self.state)?;
        let Some((bytes, expires_at)) = state.ceremonies.remove(key) else {
            return Ok(None);
        };
        if Utc::now() >= expires_at {
            return Ok(None);
        }
        Ok(Some(bytes))
    }
}
