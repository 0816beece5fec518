//! Authentication environment.
//!
//! The explicitly constructed provider aggregate injected into the
//! orchestrator — no ambient global client, so deterministic tests run
//! against in-memory fakes and production wires real stores.

use crate::providers::{
    AuditLog, BackupCodeStore, ChallengeStore, EmailProvider, FactorRepository, HistoryRepository,
    OneTimeCodeStore, RateLimiter, ReputationProvider, SessionStore, SmsProvider, UserRepository,
};

/// Everything the orchestrator needs from the outside world.
///
/// # Type Parameters
///
/// - `U`: user repository
/// - `F`: enrolled factor repository
/// - `C`: challenge store
/// - `O`: one-time code store
/// - `B`: backup code store
/// - `S`: session store
/// - `H`: historical signal repository
/// - `R`: IP/domain reputation collaborator
/// - `SM`: SMS gateway
/// - `E`: email transport
/// - `RL`: rate limiter
/// - `A`: audit log
#[derive(Clone)]
pub struct AuthEnvironment<U, F, C, O, B, S, H, R, SM, E, RL, A>
where
    U: UserRepository + Clone,
    F: FactorRepository + Clone,
    C: ChallengeStore + Clone,
    O: OneTimeCodeStore + Clone,
    B: BackupCodeStore + Clone,
    S: SessionStore + Clone,
    H: HistoryRepository + Clone,
    R: ReputationProvider + Clone,
    SM: SmsProvider + Clone,
    E: EmailProvider + Clone,
    RL: RateLimiter + Clone,
    A: AuditLog + Clone,
{
    /// User repository.
    pub users: U,

    /// Enrolled factor repository.
    pub factors: F,

    /// Challenge store (atomic conditional updates).
    pub challenges: C,

    /// One-time code store (atomic consumption).
    pub codes: O,

    /// Backup code store (atomic test-and-set).
    pub backup_codes: B,

    /// Session store (hash-keyed lookups).
    pub sessions: S,

    /// Historical signal repository for the risk engine.
    pub history: H,

    /// IP/domain reputation collaborator.
    pub reputation: R,

    /// SMS gateway.
    pub sms: SM,

    /// Email transport.
    pub email: E,

    /// Rate limiter (lockouts, send budgets).
    pub rate_limiter: RL,

    /// Append-only audit trail.
    pub audit: A,
}

impl<U, F, C, O, B, S, H, R, SM, E, RL, A> AuthEnvironment<U, F, C, O, B, S, H, R, SM, E, RL, A>
where
    U: UserRepository + Clone,
    F: FactorRepository + Clone,
    C: ChallengeStore + Clone,
    O: OneTimeCodeStore + Clone,
    B: BackupCodeStore + Clone,
    S: SessionStore + Clone,
    H: HistoryRepository + Clone,
    R: ReputationProvider + Clone,
    SM: SmsProvider + Clone,
    E: EmailProvider + Clone,
    RL: RateLimiter + Clone,
    A: AuditLog + Clone,
{
    /// Create a new authentication environment.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: U,
        factors: F,
        challenges: C,
        codes: O,
        backup_codes: B,
        sessions: S,
        history: H,
        reputation: R,
        sms: SM,
        email: E,
        rate_limiter: RL,
        audit: A,
    ) -> Self {
        Self {
            users,
            factors,
            challenges,
            codes,
            backup_codes,
            sessions,
            history,
            reputation,
            sms,
            email,
            rate_limiter,
            audit,
        }
    }
}
