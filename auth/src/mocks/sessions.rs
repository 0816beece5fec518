//! Mock session store.

use super::lock;
use crate::error::Result;
use crate::providers::SessionStore;
use crate::state::{Session, SessionId, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory session store for testing.
#[derive(Clone, Default)]
pub struct MockSessionStore {
    state: Arc<Mutex<HashMap<SessionId, Session>>>,
}

impl MockSessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MockSessionStore {
    async fn insert(&self, session: &Session) -> Result<()> {
        lock(&self.state)?.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn find_by_access_hash(&self, access_token_hash: &str) -> Result<Option<Session>> {
        let state = lock(&self.state)?;
        Ok(state
            .values()
            .find(|s| s.access_token_hash == access_token_hash)
            .cloned())
    }

    async fn find_by_refresh_hash(&self, refresh_token_hash: &str) -> Result<Option<Session>> {
        let state = lock(&self.state)?;
        Ok(state
            .values()
            .find(|s| s.refresh_token_hash == refresh_token_hash)
            .cloned())
    }

    async fn remove(&self, session_id: SessionId) -> Result<bool> {
        Ok(lock(&self.state)?.remove(&session_id).is_some())
    }

    async fn remove_user_sessions(&self, user_id: UserId) -> Result<u32> {
        let mut state = lock(&self.state)?;
        let before = state.len();
        state.retain(|_, s| s.user_id != user_id);
        #[allow(clippy::cast_possible_truncation)]
        Ok((before - state.len()) as u32)
    }
}
