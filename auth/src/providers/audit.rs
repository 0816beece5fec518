//! Append-only audit trail trait.
//!
//! Every verification, enrollment, removal and risk assessment is
//! recorded regardless of outcome. The trail is typed and append-only;
//! it is never used as working storage for codes or challenges.

use crate::error::Result;
use crate::state::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Kind of audited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// Primary authentication succeeded.
    LoginSucceeded,
    /// Primary authentication failed.
    LoginFailed,
    /// Account locked by the failure rate limit.
    AccountLocked,
    /// Risk assessment completed.
    RiskAssessed,
    /// MFA challenge created.
    ChallengeCreated,
    /// A factor verification against a challenge failed.
    ChallengeAttemptFailed,
    /// A factor verification against a challenge succeeded.
    ChallengeFactorSatisfied,
    /// Challenge completed and deleted.
    ChallengeCompleted,
    /// Challenge invalidated by the attempt ceiling.
    ChallengeInvalidated,
    /// Verification attempted against an expired challenge.
    ChallengeExpired,
    /// Factor enrolled.
    FactorEnrolled,
    /// Factor removed.
    FactorRemoved,
    /// Backup code batch regenerated.
    BackupCodesRegenerated,
    /// Remaining backup codes dropped to the low threshold.
    BackupCodesLow,
    /// One-time code issued.
    OneTimeCodeIssued,
    /// One-time code delivery failed.
    OneTimeCodeDeliveryFailed,
    /// Session issued.
    SessionIssued,
    /// Session revoked (logout or rotation).
    SessionRevoked,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event kind.
    pub kind: AuditKind,

    /// Subject user, when known.
    pub user_id: Option<UserId>,

    /// Source address, when known.
    pub ip_address: Option<IpAddr>,

    /// Whether the audited operation succeeded.
    pub success: bool,

    /// Structured detail payload.
    pub detail: serde_json::Value,

    /// Event timestamp.
    pub recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Build an event stamped now.
    #[must_use]
    pub fn new(kind: AuditKind, success: bool) -> Self {
        Self {
            kind,
            user_id: None,
            ip_address: None,
            success,
            detail: serde_json::Value::Null,
            recorded_at: Utc::now(),
        }
    }

    /// Attach the subject user.
    #[must_use]
    pub const fn user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Attach the source address.
    #[must_use]
    pub const fn ip(mut self, ip_address: IpAddr) -> Self {
        self.ip_address = Some(ip_address);
        self
    }

    /// Attach a structured detail payload.
    #[must_use]
    pub fn detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Append-only audit log.
pub trait AuditLog: Send + Sync {
    /// Append an event. Never read back by the core.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails; callers treat audit failures as
    /// non-fatal for the authentication flow but MUST log them.
    fn record(
        &self,
        event: AuditEvent,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
