//! SMTP email provider implementation using Lettre.

use crate::error::{AuthError, Result};
use crate::providers::EmailProvider;
use chrono::{DateTime, Utc};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// SMTP email provider.
///
/// Sends real mail via an SMTP relay, suitable for production use.
#[derive(Clone)]
pub struct SmtpEmailProvider {
    /// SMTP server address.
    smtp_server: String,

    /// SMTP server port.
    smtp_port: u16,

    /// SMTP credentials.
    credentials: Credentials,

    /// Sender email address.
    from_email: String,

    /// Sender display name.
    from_name: String,
}

impl SmtpEmailProvider {
    /// Create a new SMTP email provider.
    #[must_use]
    pub fn new(
        smtp_server: String,
        smtp_port: u16,
        smtp_username: String,
        smtp_password: String,
        from_email: String,
        from_name: String,
    ) -> Self {
        Self {
            smtp_server,
            smtp_port,
            credentials: Credentials::new(smtp_username, smtp_password),
            from_email,
            from_name,
        }
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        Ok(
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.smtp_server)
                .map_err(|e| AuthError::InternalError(format!("SMTP relay error: {e}")))?
                .port(self.smtp_port)
                .credentials(self.credentials.clone())
                .build(),
        )
    }

    fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }

    async fn deliver(&self, to: &str, subject: &str, body: String) -> Result<()> {
        let message = Message::builder()
            .from(
                self.from_header()
                    .parse()
                    .map_err(|e| AuthError::InternalError(format!("invalid sender: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| AuthError::InternalError(format!("invalid recipient: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| AuthError::InternalError(format!("message build failed: {e}")))?;

        self.build_transport()?
            .send(message)
            .await
            .map_err(|error| {
                tracing::warn!(%error, "SMTP send failed");
                AuthError::DeliveryFailure
            })?;

        Ok(())
    }
}

impl EmailProvider for SmtpEmailProvider {
    async fn send_one_time_code(
        &self,
        to: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let minutes = (expires_at - Utc::now()).num_minutes().max(0);
        let body = format!(
            "Your verification code is {code}.\n\n\
             It expires in {minutes} minutes. If you did not request this code, \
             someone may be trying to access your account."
        );
        self.deliver(to, "Your verification code", body).await
    }

    async fn send_security_alert(&self, to: &str, subject: &str, message: &str) -> Result<()> {
        self.deliver(to, subject, message.to_string()).await
    }
}
