//! Rate limiter trait.
//!
//! Sliding-window rate limiting over durable state. Counters are
//! re-derived from the window on every check, so multiple service
//! instances observe consistent limits without process-local state.

use crate::error::Result;
use std::time::Duration;

/// Sliding-window rate limiter.
///
/// Keys are caller-chosen strings scoping the limited operation, e.g.
/// `login:{email}` for failed primary attempts or `otp:{user}:{channel}`
/// for code sends.
pub trait RateLimiter: Send + Sync {
    /// Check the limit and record an attempt in one atomic operation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::RateLimited`] when `max_attempts`
    /// within `window` is already reached; the attempt is not recorded
    /// in that case.
    fn check_and_record(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Number of recorded attempts currently inside `window`.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn attempts(
        &self,
        key: &str,
        window: Duration,
    ) -> impl std::future::Future<Output = Result<u32>> + Send;

    /// Clear the counter for a key (successful authentication, admin
    /// override).
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn reset(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
