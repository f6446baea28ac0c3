//! Prahari Core - Abuse detection engine for the parking marketplace API
//!
//! Provides protection against:
//! - Credential stuffing and brute-force attempts (time-windowed IP blocking)
//! - Request flooding (per-operation rate limiting)
//! - Bot-driven signups (hCaptcha verification)
//!
//! All state is in-memory and process-local. A restart clears every block and
//! counter; cross-instance sharing would need an external store.

pub mod activity;
pub mod blocker;
pub mod captcha;
pub mod error;
pub mod gate;
pub mod throttle;

pub use activity::{ActivityKind, BlockedIp, SuspiciousActivity};
pub use blocker::{BlockPolicy, IpBlocker};
pub use captcha::CaptchaVerifier;
pub use error::AbuseError;
pub use gate::{client_ip, RequestGate};
pub use throttle::{ThrottleConfig, ThrottleGuard};

use chrono::{DateTime, SecondsFormat};

/// Current time as milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Format an epoch-millisecond timestamp as RFC 3339 for user-facing messages.
pub fn format_timestamp(ms: u64) -> String {
    DateTime::from_timestamp_millis(ms as i64)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| ms.to_string())
}
