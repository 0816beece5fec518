//! Provider traits for all external collaborators.
//!
//! This module defines the contracts the orchestration core expects
//! from the outside world: durable storage, ephemeral stores, delivery
//! channels, reputation feeds, rate limiting and the audit trail.
//!
//! # Architecture
//!
//! Providers are **interfaces**, not implementations. Every component
//! receives its providers by explicit construction — there is no
//! ambient global client. This enables:
//!
//! - **Testing**: in-memory mocks (deterministic, memory speed)
//! - **Production**: Redis/PostgreSQL stores, SMTP/SMS gateways
//! - **Concurrency**: the atomic operations the challenge and code
//!   stores promise are part of the trait contract, so every backend
//!   provides the same race-free semantics
//!
//! All traits use return-position `impl Future` methods and require
//! `Send + Sync`, so calls stay statically dispatched and usable
//! across task boundaries.

pub mod audit;
pub mod backup_codes;
pub mod challenges;
pub mod codes;
pub mod console_email;
pub mod email;
pub mod factors;
pub mod history;
pub mod http_reputation;
pub mod http_sms;
pub mod rate_limiter;
pub mod reputation;
pub mod sessions;
pub mod sms;
pub mod smtp_email;
pub mod users;

// Re-export provider traits and their data models
pub use audit::{AuditEvent, AuditKind, AuditLog};
pub use backup_codes::{BackupCodeRecord, BackupCodeStore};
pub use challenges::ChallengeStore;
pub use codes::{OneTimeCode, OneTimeCodeStore, OtpChannel};
pub use email::EmailProvider;
pub use factors::{FactorMaterial, FactorRepository};
pub use history::{DeviceHistory, HistoryRepository, LocationStamp, LoginStats};
pub use rate_limiter::RateLimiter;
pub use reputation::{DomainReputation, IpReputation, ReputationProvider};
pub use sessions::SessionStore;
pub use sms::SmsProvider;
pub use users::{UserRecord, UserRepository};

// Re-export the concrete delivery/reputation implementations
pub use console_email::ConsoleEmailProvider;
pub use http_reputation::HttpReputationProvider;
pub use http_sms::{ConsoleSmsProvider, HttpSmsProvider};
pub use smtp_email::SmtpEmailProvider;
