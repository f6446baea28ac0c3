//! Composed entry point for guarded operations
//!
//! Order matters: a blocked identity is rejected before it can consume a
//! rate-limit slot, and the attempt itself is only recorded once both
//! checks pass.

use crate::activity::ActivityKind;
use crate::blocker::IpBlocker;
use crate::captcha::CaptchaVerifier;
use crate::error::AbuseError;
use crate::format_timestamp;
use crate::throttle::ThrottleGuard;
use http::header::USER_AGENT;
use http::HeaderMap;
use std::net::SocketAddr;
use std::sync::Arc;

/// Resolve the client identity for a request.
///
/// Proxy-forwarding headers win over the raw connection address. The headers
/// are trusted as-is: spoofable, and shared NATs collide. A known weakness
/// of the scheme, accepted here.
pub fn client_ip(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        if let Some(first) = forwarded
            .split(',')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return first.to_string();
        }
    }
    if let Some(ip) = header("x-real-ip") {
        return ip.to_string();
    }
    if let Some(ip) = header("x-client-ip") {
        return ip.to_string();
    }

    remote_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Admission control for guarded operations
#[derive(Clone)]
pub struct RequestGate {
    blocker: Arc<IpBlocker>,
    throttle: ThrottleGuard,
    captcha: CaptchaVerifier,
}

impl RequestGate {
    pub fn new(blocker: Arc<IpBlocker>, throttle: ThrottleGuard, captcha: CaptchaVerifier) -> Self {
        Self {
            blocker,
            throttle,
            captcha,
        }
    }

    pub fn blocker(&self) -> &Arc<IpBlocker> {
        &self.blocker
    }

    pub fn captcha(&self) -> &CaptchaVerifier {
        &self.captcha
    }

    /// Admit a request to a guarded operation, or reject it.
    ///
    /// Resolves the client identity, rejects active blocks (verbatim reason
    /// and expiry), counts the request against the operation's rate window,
    /// and records the attempt. Returns the resolved identity for the
    /// handler's own bookkeeping.
    pub fn admit(
        &self,
        headers: &HeaderMap,
        remote_addr: Option<SocketAddr>,
        scope: &str,
        operation: &str,
        kind: ActivityKind,
    ) -> Result<String, AbuseError> {
        let ip = client_ip(headers, remote_addr);
        let user_agent = headers.get(USER_AGENT).and_then(|v| v.to_str().ok());

        if self.blocker.is_blocked(&ip) {
            if let Some(info) = self.blocker.block_info(&ip) {
                return Err(AbuseError::Blocked {
                    reason: info.reason,
                    until: format_timestamp(info.blocked_until),
                });
            }
        }

        self.throttle.check(scope, operation, &ip, user_agent)?;

        self.blocker
            .record_activity(&ip, kind, &format!("{scope}:{operation}"), user_agent);

        Ok(ip)
    }

    /// Verify a CAPTCHA token for an admitted request.
    ///
    /// Every failure (missing token, upstream rejection, upstream outage)
    /// is recorded as a `captcha_failure` before it propagates.
    pub async fn verify_captcha(
        &self,
        token: &str,
        ip: &str,
        endpoint: &str,
    ) -> Result<(), AbuseError> {
        match self.captcha.verify(token, Some(ip)).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.blocker
                    .record_activity(ip, ActivityKind::CaptchaFailure, endpoint, None);
                Err(err)
            }
        }
    }
}
