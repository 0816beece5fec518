//! Mock user repository.

use super::lock;
use crate::error::Result;
use crate::providers::{UserRecord, UserRepository};
use crate::state::UserId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    users: HashMap<UserId, UserRecord>,
    /// Previous password hashes per user, newest first.
    history: HashMap<UserId, Vec<String>>,
}

/// In-memory user repository for testing.
#[derive(Clone, Default)]
pub struct MockUserRepository {
    state: Arc<Mutex<State>>,
}

impl MockUserRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user record.
    ///
    /// # Errors
    ///
    /// Returns error if the state lock is poisoned.
    pub fn insert_user(&self, user: UserRecord) -> Result<()> {
        lock(&self.state)?.users.insert(user.user_id, user);
        Ok(())
    }
}

impl UserRepository for MockUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let state = lock(&self.state)?;
        Ok(state
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        Ok(lock(&self.state)?.users.get(&user_id).cloned())
    }

    async fn password_history(&self, user_id: UserId, limit: usize) -> Result<Vec<String>> {
        let state = lock(&self.state)?;
        let mut hashes = Vec::with_capacity(limit);
        if let Some(user) = state.users.get(&user_id) {
            hashes.push(user.password_hash.clone());
        }
        if let Some(previous) = state.history.get(&user_id) {
            hashes.extend(previous.iter().cloned());
        }
        hashes.truncate(limit);
        Ok(hashes)
    }

    async fn update_password(&self, user_id: UserId, password_hash: &str) -> Result<()> {
        let mut guard = lock(&self.state)?;
        let state = &mut *guard;
        if let Some(user) = state.users.get_mut(&user_id) {
            let old = std::mem::replace(&mut user.password_hash, password_hash.to_string());
            state.history.entry(user_id).or_default().insert(0, old);
        }
        Ok(())
    }
}
