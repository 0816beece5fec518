//! Mock email provider.

use super::lock;
use crate::error::{AuthError, Result};
use crate::providers::EmailProvider;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    codes: Vec<(String, String)>,
    alerts: Vec<(String, String, String)>,
    fail_next: bool,
}

/// In-memory email provider for testing; captures codes and alerts.
#[derive(Clone, Default)]
pub struct MockEmailProvider {
    state: Arc<Mutex<State>>,
}

impl MockEmailProvider {
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

    /// The most recently delivered code.
    #[must_use]
    pub fn last_code(&self) -> Option<String> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.codes.last().map(|(_, code)| code.clone()))
    }

    /// All delivered security alerts as (to, subject, message).
    #[must_use]
    pub fn alerts(&self) -> Vec<(String, String, String)> {
        self.state
            .lock()
            .map(|state| state.alerts.clone())
            .unwrap_or_default()
    }
}

impl EmailProvider for MockEmailProvider {
    async fn send_one_time_code(
        &self,
        to: &str,
        code: &str,
        _expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = lock(&self.state)?;
        if state.fail_next {
            state.fail_next = false;
            return Err(AuthError::DeliveryFailure);
        }
        state.codes.push((to.to_string(), code.to_string()));
        Ok(())
    }

    async fn send_security_alert(&self, to: &str, subject: &str, message: &str) -> Result<()> {
        let mut state = lock(&self.state)?;
        if state.fail_next {
            state.fail_next = false;
            return Err(AuthError::DeliveryFailure);
        }
        state
            .alerts
            .push((to.to_string(), subject.to_string(), message.to_string()));
        Ok(())
    }
}
