//! IP blocking with time-windowed suspicious-activity tracking
//!
//! Tracks discrete suspicious events per client identity inside a rolling
//! monitoring window and escalates to a time-bounded block once a policy
//! threshold fires. Blocks expire lazily on read and eagerly on sweep.

use crate::activity::{ActivityKind, BlockedIp, SuspiciousActivity};
use crate::{format_timestamp, now_ms};
use dashmap::DashMap;

/// Failed attempts that, combined with CAPTCHA failures, mark a pattern
const PATTERN_FAILED_THRESHOLD: usize = 5;

/// CAPTCHA failures that, combined with failed attempts, mark a pattern
const PATTERN_CAPTCHA_THRESHOLD: usize = 3;

/// Rate limit violations tolerated inside the monitoring window
const RATE_HIT_THRESHOLD: usize = 3;

/// Blocking policy tunables
#[derive(Debug, Clone)]
pub struct BlockPolicy {
    /// Failed attempts inside the window before a block fires
    pub max_failed_attempts: usize,

    /// How long a block lasts
    pub block_duration_ms: u64,

    /// How far back activity counts toward a threshold
    pub monitoring_window_ms: u64,

    /// Cadence of the periodic sweep
    pub cleanup_interval_ms: u64,
}

impl Default for BlockPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 10,
            block_duration_ms: 24 * 60 * 60 * 1000,
            monitoring_window_ms: 60 * 60 * 1000,
            cleanup_interval_ms: 60 * 60 * 1000,
        }
    }
}

/// Per-identity block registry and activity window
///
/// All maps are concurrent; callers share the tracker behind an `Arc`.
pub struct IpBlocker {
    blocks: DashMap<String, BlockedIp>,
    activities: DashMap<String, Vec<SuspiciousActivity>>,
    policy: BlockPolicy,
}

impl IpBlocker {
    pub fn new(policy: BlockPolicy) -> Self {
        Self {
            blocks: DashMap::new(),
            activities: DashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &BlockPolicy {
        &self.policy
    }

    /// Check whether an identity is currently blocked.
    ///
    /// Reading an expired block deletes it (lazy expiry), so a read can
    /// mutate state.
    pub fn is_blocked(&self, ip: &str) -> bool {
        self.is_blocked_at(ip, now_ms())
    }

    fn is_blocked_at(&self, ip: &str, now: u64) -> bool {
        let expired = match self.blocks.get(ip) {
            None => return false,
            Some(block) => now > block.blocked_until,
        };

        if expired {
            self.blocks.remove(ip);
            tracing::info!("Block on {} expired, lifting", ip);
            return false;
        }

        true
    }

    /// Get the block record for an identity, expired or not
    pub fn block_info(&self, ip: &str) -> Option<BlockedIp> {
        self.blocks.get(ip).map(|b| b.clone())
    }

    /// Record a suspicious event and evaluate the blocking policy against
    /// the identity's recent activity.
    pub fn record_activity(
        &self,
        ip: &str,
        kind: ActivityKind,
        endpoint: &str,
        user_agent: Option<&str>,
    ) {
        self.record_activity_at(ip, kind, endpoint, user_agent, now_ms());
    }

    pub(crate) fn record_activity_at(
        &self,
        ip: &str,
        kind: ActivityKind,
        endpoint: &str,
        user_agent: Option<&str>,
        now: u64,
    ) {
        let window = self.policy.monitoring_window_ms;

        let (failed, captcha_failures, rate_hits) = {
            let mut entry = self.activities.entry(ip.to_string()).or_default();
            entry.push(SuspiciousActivity {
                ip: ip.to_string(),
                kind,
                timestamp: now,
                endpoint: endpoint.to_string(),
                user_agent: user_agent.map(str::to_string),
            });
            entry.retain(|a| now.saturating_sub(a.timestamp) < window);

            let count = |k: ActivityKind| entry.iter().filter(|a| a.kind == k).count();
            (
                count(ActivityKind::FailedAttempt),
                count(ActivityKind::CaptchaFailure),
                count(ActivityKind::RateLimitHit),
            )
        };

        tracing::debug!(
            "Suspicious activity from {}: {} on {}",
            ip,
            kind.as_str(),
            endpoint
        );

        // First matching rule wins; each is terminal for this call.
        if failed >= self.policy.max_failed_attempts {
            self.block_at(ip, format!("Too many failed attempts: {failed}"), now);
        } else if failed >= PATTERN_FAILED_THRESHOLD && captcha_failures >= PATTERN_CAPTCHA_THRESHOLD
        {
            self.block_at(
                ip,
                format!(
                    "Suspicious pattern: {failed} failed attempts, {captcha_failures} CAPTCHA failures"
                ),
                now,
            );
        } else if rate_hits >= RATE_HIT_THRESHOLD {
            self.block_at(ip, format!("Frequent rate limit violations: {rate_hits}"), now);
        }
    }

    /// Record a failed authentication or registration attempt.
    ///
    /// An identity that already has a block record (even one past expiry
    /// that no sweep has removed yet) only gets its attempt counter bumped;
    /// policy is not re-evaluated.
    pub fn record_failed_attempt(&self, ip: &str, reason: &str) {
        self.record_failed_attempt_at(ip, reason, now_ms());
    }

    fn record_failed_attempt_at(&self, ip: &str, reason: &str, now: u64) {
        if let Some(mut block) = self.blocks.get_mut(ip) {
            block.attempt_count += 1;
            block.last_attempt = now;
            return;
        }

        self.record_activity_at(ip, ActivityKind::FailedAttempt, "auth", Some(reason), now);

        // Shortcut threshold: counts every recorded activity for this
        // identity, not only failed attempts.
        let total = self.activities.get(ip).map(|a| a.len()).unwrap_or(0);
        if total >= self.policy.max_failed_attempts {
            self.block_at(ip, format!("Too many failed attempts: {total}"), now);
        }
    }

    /// Block an identity, overwriting any existing record
    pub fn block(&self, ip: &str, reason: &str) {
        self.block_at(ip, reason.to_string(), now_ms());
    }

    fn block_at(&self, ip: &str, reason: String, now: u64) {
        let blocked_until = now + self.policy.block_duration_ms;
        self.blocks.insert(
            ip.to_string(),
            BlockedIp {
                ip: ip.to_string(),
                blocked_until,
                reason: reason.clone(),
                attempt_count: 0,
                first_attempt: now,
                last_attempt: now,
            },
        );
        tracing::warn!(
            "IP {} blocked until {}: {}",
            ip,
            format_timestamp(blocked_until),
            reason
        );
    }

    /// Lift a block. Returns whether one existed.
    pub fn unblock(&self, ip: &str) -> bool {
        let removed = self.blocks.remove(ip).is_some();
        if removed {
            tracing::info!("IP {} manually unblocked", ip);
        }
        removed
    }

    /// Recorded activity for an identity (whatever the sweep has not aged out)
    pub fn activities(&self, ip: &str) -> Vec<SuspiciousActivity> {
        self.activities.get(ip).map(|a| a.clone()).unwrap_or_default()
    }

    /// All block records, expired or not
    pub fn blocked(&self) -> Vec<BlockedIp> {
        self.blocks.iter().map(|e| e.value().clone()).collect()
    }

    /// Number of identities with a block record
    pub fn blocked_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of identities with recorded activity
    pub fn tracked_count(&self) -> usize {
        self.activities.len()
    }

    /// Drop expired blocks and age out old activity.
    ///
    /// Runs on the cleanup interval; between sweeps, expired records linger
    /// but never count (lazy expiry on read, window filter on evaluation).
    pub fn sweep(&self) {
        self.sweep_at(now_ms());
    }

    fn sweep_at(&self, now: u64) {
        let before = self.blocks.len();
        self.blocks.retain(|_, block| now <= block.blocked_until);
        let lifted = before - self.blocks.len();

        let window = self.policy.monitoring_window_ms;
        self.activities.retain(|_, records| {
            records.retain(|a| now.saturating_sub(a.timestamp) < window);
            !records.is_empty()
        });

        if lifted > 0 {
            tracing::debug!("Sweep lifted {} expired block(s)", lifted);
        }
    }
}

impl Default for IpBlocker {
    fn default() -> Self {
        Self::new(BlockPolicy::default())
    }
}
