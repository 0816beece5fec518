//! Mock one-time code store.

use super::lock;
use crate::error::Result;
use crate::providers::{OneTimeCode, OneTimeCodeStore, OtpChannel};
use crate::state::UserId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory one-time code store for testing.
///
/// One outstanding code per (user, channel); `take` is a mutex-atomic
/// get-and-delete.
#[derive(Clone, Default)]
pub struct MockOneTimeCodeStore {
    state: Arc<Mutex<HashMap<(UserId, OtpChannel), OneTimeCode>>>,
}

impl MockOneTimeCodeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OneTimeCodeStore for MockOneTimeCodeStore {
    async fn put(&self, code: &OneTimeCode) -> Result<()> {
        lock(&self.state)?.insert((code.user_id, code.channel), code.clone());
        Ok(())
    }

    async fn take(&self, user_id: UserId, channel: OtpChannel) -> Result<Option<OneTimeCode>> {
        Ok(lock(&self.state)?.remove(&(user_id, channel)))
    }
}
