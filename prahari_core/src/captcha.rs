//! hCaptcha token verification
//!
//! One form-encoded POST to the siteverify endpoint per token. The verifier
//! never records suspicious activity itself; the gate wires failures into
//! the blocker.

use crate::error::AbuseError;
use serde::Deserialize;
use std::time::Duration;

const HCAPTCHA_VERIFY_URL: &str = "https://hcaptcha.com/siteverify";

/// Upstream call budget; expiry counts as an upstream failure (fail-closed)
const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

/// Client for the hCaptcha verification endpoint
#[derive(Clone)]
pub struct CaptchaVerifier {
    client: reqwest::Client,
    secret: Option<String>,
    verify_url: String,
}

impl CaptchaVerifier {
    /// Build a verifier. A `None` (or empty) secret disables verification:
    /// every token passes, loudly, until a secret is configured.
    pub fn new(secret: Option<String>) -> Self {
        Self::with_verify_url(secret, HCAPTCHA_VERIFY_URL)
    }

    /// Build a verifier against a non-default endpoint
    pub fn with_verify_url(secret: Option<String>, verify_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret: secret.filter(|s| !s.is_empty()),
            verify_url: verify_url.into(),
        }
    }

    /// Whether a verification secret is configured
    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Verify a CAPTCHA token, optionally pinning the client identity.
    ///
    /// Blank tokens fail before any network traffic. Network errors,
    /// timeouts, non-2xx answers, and malformed bodies all map to
    /// `CaptchaUpstream`; a well-formed negative answer maps to
    /// `CaptchaRejected` with the upstream error codes.
    pub async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<(), AbuseError> {
        let Some(secret) = &self.secret else {
            tracing::warn!("HCAPTCHA_SECRET_KEY not configured - CAPTCHA verification disabled");
            return Ok(());
        };

        if token.trim().is_empty() {
            return Err(AbuseError::CaptchaRequired);
        }

        let mut form = vec![("secret", secret.as_str()), ("response", token)];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response = self
            .client
            .post(&self.verify_url)
            .timeout(VERIFY_TIMEOUT)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("CAPTCHA verification request failed: {}", e);
                AbuseError::CaptchaUpstream(e.to_string())
            })?;

        if !response.status().is_success() {
            tracing::error!("CAPTCHA upstream answered {}", response.status());
            return Err(AbuseError::CaptchaUpstream(format!(
                "status {}",
                response.status()
            )));
        }

        let verdict: VerifyResponse = response.json().await.map_err(|e| {
            tracing::error!("CAPTCHA upstream answered malformed body: {}", e);
            AbuseError::CaptchaUpstream(e.to_string())
        })?;

        if !verdict.success {
            let codes = if verdict.error_codes.is_empty() {
                "Unknown error".to_string()
            } else {
                verdict.error_codes.join(", ")
            };
            tracing::warn!("CAPTCHA rejected: {}", codes);
            return Err(AbuseError::CaptchaRejected(codes));
        }

        Ok(())
    }
}
