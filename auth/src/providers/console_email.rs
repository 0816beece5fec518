//! Console email provider for development.

use crate::error::Result;
use crate::providers::EmailProvider;
use chrono::{DateTime, Utc};
use tracing::info;

/// Logs email deliveries instead of sending them.
#[derive(Clone, Debug, Default)]
pub struct ConsoleEmailProvider;

impl ConsoleEmailProvider {
    /// Create a new console email provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EmailProvider for ConsoleEmailProvider {
    async fn send_one_time_code(
        &self,
        to: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let minutes = (expires_at - Utc::now()).num_minutes();
        info!(
            to = %to,
            code = %code,
            expires_in_minutes = minutes,
            "one-time code email (development mode)"
        );
        Ok(())
    }

    async fn send_security_alert(&self, to: &str, subject: &str, message: &str) -> Result<()> {
        info!(
            to = %to,
            subject = %subject,
            message = %message,
            "security alert email (development mode)"
        );
        Ok(())
    }
}
