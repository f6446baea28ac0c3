//! Per-operation request throttling
//!
//! Fixed-window counters keyed by operation and client identity. One
//! operation's exhaustion never throttles another operation for the same
//! client. Violations feed `rate_limit_hit` events into the blocker.
//!
//! Counters are in-memory and single-instance; horizontal scaling would
//! need an external shared store.

use crate::activity::ActivityKind;
use crate::blocker::IpBlocker;
use crate::error::AbuseError;
use crate::now_ms;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Throttle configuration
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl ThrottleConfig {
    pub fn new(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_millis(window_ms),
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self::new(5, 15 * 60 * 1000)
    }
}

/// One counting window for a (operation, identity) pair
#[derive(Debug)]
struct RateWindow {
    count: u32,
    reset_at: u64,
}

/// In-memory fixed-window rate limiter
#[derive(Clone)]
pub struct ThrottleGuard {
    windows: Arc<DashMap<String, RateWindow>>,
    config: ThrottleConfig,
    blocker: Arc<IpBlocker>,
}

impl ThrottleGuard {
    pub fn new(config: ThrottleConfig, blocker: Arc<IpBlocker>) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            config,
            blocker,
        }
    }

    /// Count a request against the (scope, operation, identity) window.
    ///
    /// A rejection records a `rate_limit_hit` for the identity and carries
    /// a retry-after estimate in whole minutes, rounded up.
    pub fn check(
        &self,
        scope: &str,
        operation: &str,
        ip: &str,
        user_agent: Option<&str>,
    ) -> Result<(), AbuseError> {
        self.check_at(scope, operation, ip, user_agent, now_ms())
    }

    fn check_at(
        &self,
        scope: &str,
        operation: &str,
        ip: &str,
        user_agent: Option<&str>,
        now: u64,
    ) -> Result<(), AbuseError> {
        let key = format!("{scope}:{operation}:{ip}");
        let window_ms = self.config.window.as_millis() as u64;

        let rejected_at = match self.windows.entry(key) {
            Entry::Occupied(mut entry) => {
                let window = entry.get_mut();
                if now > window.reset_at {
                    *window = RateWindow {
                        count: 1,
                        reset_at: now + window_ms,
                    };
                    None
                } else if window.count < self.config.max_requests {
                    window.count += 1;
                    None
                } else {
                    Some(window.reset_at)
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(RateWindow {
                    count: 1,
                    reset_at: now + window_ms,
                });
                None
            }
        };

        let Some(reset_at) = rejected_at else {
            return Ok(());
        };

        self.blocker.record_activity_at(
            ip,
            ActivityKind::RateLimitHit,
            &format!("{scope}:{operation}"),
            user_agent,
            now,
        );

        Err(AbuseError::RateLimited {
            retry_after_mins: (reset_at - now).div_ceil(60_000),
        })
    }

    /// Drop windows that have run out. Live windows are never touched.
    pub fn sweep(&self) {
        self.sweep_at(now_ms());
    }

    fn sweep_at(&self, now: u64) {
        self.windows.retain(|_, window| now <= window.reset_at);
    }

    /// Number of live counting windows
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }
}
