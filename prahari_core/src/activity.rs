//! Records tracked per client identity: suspicious events and active blocks

use serde::{Deserialize, Serialize};

/// Kind of suspicious event recorded for an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Failed authentication or registration attempt
    FailedAttempt,

    /// CAPTCHA verification failure
    CaptchaFailure,

    /// Rate limit violation
    RateLimitHit,

    /// Registration attempt (recorded regardless of outcome)
    RegistrationAttempt,

    /// Login attempt (recorded regardless of outcome)
    LoginAttempt,
}

impl ActivityKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::FailedAttempt => "failed_attempt",
            ActivityKind::CaptchaFailure => "captcha_failure",
            ActivityKind::RateLimitHit => "rate_limit_hit",
            ActivityKind::RegistrationAttempt => "registration_attempt",
            ActivityKind::LoginAttempt => "login_attempt",
        }
    }
}

/// A single suspicious event, retained only within the monitoring window
#[derive(Debug, Clone, Serialize)]
pub struct SuspiciousActivity {
    /// Client identity the event belongs to
    pub ip: String,

    /// What happened
    pub kind: ActivityKind,

    /// When it happened (epoch milliseconds)
    pub timestamp: u64,

    /// Operation the event was observed on (e.g. "auth:register")
    pub endpoint: String,

    /// Client user agent, if one was sent
    pub user_agent: Option<String>,
}

/// An active (or not yet swept) block on a client identity
#[derive(Debug, Clone, Serialize)]
pub struct BlockedIp {
    /// Blocked identity
    pub ip: String,

    /// Block expiry (epoch milliseconds)
    pub blocked_until: u64,

    /// Why the block was created
    pub reason: String,

    /// Attempts made while the block was in place
    pub attempt_count: u32,

    /// When the block was created (epoch milliseconds)
    pub first_attempt: u64,

    /// Most recent attempt while blocked (epoch milliseconds)
    pub last_attempt: u64,
}
