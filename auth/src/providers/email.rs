//! Email delivery trait.

use crate::error::Result;
use chrono::{DateTime, Utc};

/// Email transport collaborator.
///
/// This trait abstracts over email delivery services (SMTP relay,
/// SendGrid, AWS SES, etc.). Like the SMS gateway it is fire-and-forget
/// with a success/failure result.
pub trait EmailProvider: Send + Sync {
    /// Send a one-time verification code.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::DeliveryFailure`] if the transport
    /// rejects or cannot deliver the message.
    fn send_one_time_code(
        &self,
        to: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Send a security alert (new device, low backup codes, lockout).
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::DeliveryFailure`] if the transport
    /// rejects the message.
    fn send_security_alert(
        &self,
        to: &str,
        subject: &str,
        message: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
