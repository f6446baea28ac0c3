//! Route handlers for the Prahari gate service

pub mod admin;
pub mod auth;

use crate::config::Config;
use axum::{
    body::Body,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use dashmap::DashMap;
use prahari_core::{AbuseError, CaptchaVerifier, IpBlocker, RequestGate, ThrottleGuard};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gate: RequestGate,
    pub blocker: Arc<IpBlocker>,
    pub throttle: ThrottleGuard,
    /// Demo user store: email -> account record
    pub users: Arc<DashMap<String, auth::Account>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let blocker = Arc::new(IpBlocker::new(config.block_policy()));
        let throttle = ThrottleGuard::new(config.throttle_config(), blocker.clone());
        let captcha = CaptchaVerifier::new(config.hcaptcha_secret.clone());
        let gate = RequestGate::new(blocker.clone(), throttle.clone(), captcha);

        Self {
            config: Arc::new(config),
            gate,
            blocker,
            throttle,
            users: Arc::new(DashMap::new()),
        }
    }
}

/// Build the service router
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(auth::router())
        .merge(admin::router())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "blocked_ips": state.blocker.blocked_count(),
        "tracked_ips": state.blocker.tracked_count(),
        "rate_windows": state.throttle.window_count(),
        "captcha": if state.gate.captcha().is_configured() { "enabled" } else { "disabled" },
    }))
}

/// Map a gate rejection to an HTTP response
pub fn abuse_response(err: AbuseError) -> Response {
    match err {
        AbuseError::Blocked { .. } => (StatusCode::FORBIDDEN, err.to_string()).into_response(),
        AbuseError::RateLimited { retry_after_mins } => Response::builder()
            .status(StatusCode::TOO_MANY_REQUESTS)
            .header("Retry-After", (retry_after_mins * 60).to_string())
            .body(Body::from(err.to_string()))
            .unwrap(),
        AbuseError::CaptchaRequired => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
        // upstream detail stays in the logs; clients get a generic failure
        AbuseError::CaptchaRejected(_) | AbuseError::CaptchaUpstream(_) => {
            (StatusCode::BAD_REQUEST, "CAPTCHA verification failed").into_response()
        }
    }
}
