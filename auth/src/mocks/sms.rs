//! Mock SMS provider.

use super::lock;
use crate::error::{AuthError, Result};
use crate::providers::SmsProvider;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    sent: Vec<(String, String)>,
    fail_next: bool,
}

/// In-memory SMS provider for testing; captures sent messages.
#[derive(Clone, Default)]
pub struct MockSmsProvider {
    state: Arc<Mutex<State>>,
}

impl MockSmsProvider {
    /// Create a provider with an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next send fail with a delivery error.
    pub fn fail_next_send(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_next = true;
        }
    }

    /// All sent (destination, message) pairs.
    #[must_use]
    pub fn sent(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .map(|state| state.sent.clone())
            .unwrap_or_default()
    }

    /// Extract the numeric code from the most recent message.
    #[must_use]
    pub fn last_code(&self) -> Option<String> {
        let state = self.state.lock().ok()?;
        let (_, message) = state.sent.last()?;
        message
            .split(|c: char| !c.is_ascii_digit())
            .find(|chunk| chunk.len() >= 4)
            .map(ToString::to_string)
    }
}

impl SmsProvider for MockSmsProvider {
    async fn send(&self, destination: &str, message: &str) -> Result<()> {
        let mut state = lock(&self.state)?;
        if state.fail_next {
            state.fail_next = false;
            return Err(AuthError::DeliveryFailure);
        }
        state
            .sent
            .push((destination.to_string(), message.to_string()));
        Ok(())
    }
}
