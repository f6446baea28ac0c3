//! Error taxonomy for gate decisions
//!
//! Every variant is recoverable at the request level: the request is
//! rejected, the process continues. Display strings are the user-facing
//! messages; upstream detail for the CAPTCHA variants stays in logs.

use thiserror::Error;

/// Reasons the gate rejects a request
#[derive(Debug, Error)]
pub enum AbuseError {
    /// Identity is under an active block
    #[error("IP address blocked until {until}. Reason: {reason}")]
    Blocked {
        /// Why the block was created
        reason: String,
        /// RFC 3339 expiry of the block
        until: String,
    },

    /// Too many requests for this operation in the current window
    #[error("Too many requests. Try again after {retry_after_mins} minutes.")]
    RateLimited {
        /// Minutes until the window resets, rounded up
        retry_after_mins: u64,
    },

    /// CAPTCHA token missing or blank
    #[error("CAPTCHA token is required")]
    CaptchaRequired,

    /// Upstream verified the token and rejected it
    #[error("CAPTCHA verification failed: {0}")]
    CaptchaRejected(String),

    /// Verification endpoint unreachable, timed out, or answered malformed
    #[error("CAPTCHA verification failed")]
    CaptchaUpstream(String),
}
