//! In-memory mock providers for testing.
//!
//! Every provider trait has a deterministic in-memory implementation
//! here, honoring the same atomicity contracts as the production
//! stores (mutex-serialized test-and-set, get-and-delete). Auth logic
//! tests run at memory speed with no external services.

mod audit;
mod backup_codes;
mod challenges;
mod codes;
mod email;
mod factors;
mod history;
mod rate_limiter;
mod reputation;
mod sessions;
mod sms;
mod users;

pub use audit::MockAuditLog;
pub use backup_codes::MockBackupCodeStore;
pub use challenges::MockChallengeStore;
pub use codes::MockOneTimeCodeStore;
pub use email::MockEmailProvider;
pub use factors::MockFactorRepository;
pub use history::MockHistoryRepository;
pub use rate_limiter::MockRateLimiter;
pub use reputation::MockReputationProvider;
pub use sessions::MockSessionStore;
pub use sms::MockSmsProvider;
pub use users::MockUserRepository;

use crate::error::AuthError;
use std::sync::{Mutex, MutexGuard};

/// Lock a mock's state, mapping poisoning to a storage error.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, AuthError> {
    mutex
        .lock()
        .map_err(|_| AuthError::InternalError("mock mutex poisoned".into()))
}
