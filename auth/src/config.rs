//! Authentication configuration.
//!
//! Per-concern configuration structures with builder-style setters.
//! Values are policy inputs provided by the application, not hardcoded
//! in the components that consume them.

use chrono::Duration;

/// Risk engine tuning.
///
/// Weights must sum to 1; the defaults follow the suggested calibration
/// (device 0.25, location 0.25, behavioral 0.20, velocity 0.15,
/// threat 0.15).
#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Weight of the device sub-assessment.
    pub device_weight: f64,

    /// Weight of the location sub-assessment.
    pub location_weight: f64,

    /// Weight of the behavioral sub-assessment.
    pub behavioral_weight: f64,

    /// Weight of the velocity sub-assessment.
    pub velocity_weight: f64,

    /// Weight of the threat-intelligence sub-assessment.
    pub threat_weight: f64,

    /// A known device younger than this still carries a penalty.
    pub new_device_age: Duration,

    /// Country change faster than this raises "impossible travel".
    pub travel_feasibility: Duration,

    /// Country codes carrying a fixed extra penalty.
    pub high_risk_countries: Vec<String>,

    /// Minimum occurrences for an hour-of-day to count as typical.
    pub typical_hour_min_count: u32,

    /// Logins in the trailing day above this add a penalty.
    pub max_daily_logins: u32,

    /// Password changes in the trailing week above this add a penalty.
    pub max_weekly_password_changes: u32,

    /// Distinct source addresses in the trailing hour above this add a
    /// penalty.
    pub max_hourly_ips: u32,

    /// Failed attempts in the trailing half hour above this add a
    /// penalty.
    pub max_recent_failures: u32,
}

impl RiskConfig {
    /// Replace the sub-assessment weights.
    #[must_use]
    pub fn with_weights(
        mut self,
        device: f64,
        location: f64,
        behavioral: f64,
        velocity: f64,
        threat: f64,
    ) -> Self {
        self.device_weight = device;
        self.location_weight = location;
        self.behavioral_weight = behavioral;
        self.velocity_weight = velocity;
        self.threat_weight = threat;
        self
    }

    /// Replace the high-risk country list.
    #[must_use]
    pub fn with_high_risk_countries(mut self, countries: Vec<String>) -> Self {
        self.high_risk_countries = countries;
        self
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            device_weight: 0.25,
            location_weight: 0.25,
            behavioral_weight: 0.20,
            velocity_weight: 0.15,
            threat_weight: 0.15,
            new_device_age: Duration::days(7),
            travel_feasibility: Duration::hours(2),
            high_risk_countries: ["KP", "IR", "SY"].map(String::from).to_vec(),
            typical_hour_min_count: 3,
            max_daily_logins: 20,
            max_weekly_password_changes: 2,
            max_hourly_ips: 3,
            max_recent_failures: 5,
        }
    }
}

/// Challenge lifecycle tuning.
#[derive(Debug, Clone)]
pub struct ChallengeConfig {
    /// Hard expiry for a challenge (minutes, not hours).
    pub ttl: Duration,

    /// Failed-attempt ceiling; reaching it invalidates the challenge.
    pub max_attempts: u32,
}

impl ChallengeConfig {
    /// Set the challenge time-to-live.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the failed-attempt ceiling.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(5),
            max_attempts: 3,
        }
    }
}

/// Password rule set and lockout policy.
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Minimum password length.
    pub min_length: usize,

    /// Require at least one uppercase, lowercase, digit and symbol.
    pub require_character_classes: bool,

    /// Number of previous passwords that may not be reused.
    pub history_depth: usize,

    /// Failed logins inside `lockout_window` before the account locks.
    pub max_failures: u32,

    /// Rolling window over which failures are counted.
    pub lockout_window: std::time::Duration,

    /// How long a lockout lasts once triggered.
    pub lockout_duration: std::time::Duration,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 12,
            require_character_classes: true,
            history_depth: 5,
            max_failures: 5,
            lockout_window: std::time::Duration::from_secs(15 * 60),
            lockout_duration: std::time::Duration::from_secs(30 * 60),
        }
    }
}

/// TOTP parameters (RFC 6238 conventions).
#[derive(Debug, Clone)]
pub struct TotpConfig {
    /// Number of digits in a code.
    pub digits: u8,

    /// Time step in seconds.
    pub period: u32,

    /// Steps of clock skew tolerated either side of now.
    pub skew_steps: u32,

    /// Issuer label embedded in provisioning URIs.
    pub issuer: String,
}

impl TotpConfig {
    /// Set the issuer label.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            digits: 6,
            period: 30,
            skew_steps: 1,
            issuer: "stepup".to_string(),
        }
    }
}

/// One-time code (SMS/email) parameters.
#[derive(Debug, Clone)]
pub struct OtpConfig {
    /// Number of digits in a delivered code.
    pub digits: u8,

    /// Code validity window.
    pub ttl: Duration,

    /// Maximum sends per destination per rolling hour.
    pub max_sends_per_hour: u32,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            digits: 6,
            ttl: Duration::minutes(5),
            max_sends_per_hour: 5,
        }
    }
}

/// Backup/recovery code parameters.
#[derive(Debug, Clone)]
pub struct BackupCodeConfig {
    /// Codes per generated batch.
    pub batch_size: usize,

    /// Characters per code.
    pub code_length: usize,

    /// Remaining-count threshold that raises the low-codes signal.
    pub low_remaining_threshold: u32,
}

impl Default for BackupCodeConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            code_length: 10,
            low_remaining_threshold: 2,
        }
    }
}

/// Session issuance parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Access token lifetime.
    pub access_ttl: Duration,

    /// Refresh token lifetime.
    pub refresh_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_ttl: Duration::hours(1),
            refresh_ttl: Duration::days(30),
        }
    }
}

/// Aggregate configuration for the whole orchestration core.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Risk engine tuning.
    pub risk: RiskConfig,

    /// Challenge lifecycle tuning.
    pub challenge: ChallengeConfig,

    /// Password rules and lockout.
    pub password: PasswordConfig,

    /// TOTP parameters.
    pub totp: TotpConfig,

    /// One-time code parameters.
    pub otp: OtpConfig,

    /// Backup code parameters.
    pub backup: BackupCodeConfig,

    /// Session issuance parameters.
    pub session: SessionConfig,
}
