//! Guarded authentication routes
//!
//! Registration and login are the sensitive flows every abuse check fronts.
//! The account store is an in-memory stand-in for the marketplace's identity
//! service; only the calls the gate makes into it matter here.

use crate::routes::{abuse_response, AppState};
use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use dashmap::mapref::entry::Entry;
use prahari_core::ActivityKind;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use uuid::Uuid;

/// Build the auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
}

/// Stored account record
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    password_digest: String,
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    name: Option<String>,
    captcha_token: Option<String>,
}

async fn register(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Response {
    let ip = match state.gate.admit(
        &headers,
        Some(addr),
        "auth",
        "register",
        ActivityKind::RegistrationAttempt,
    ) {
        Ok(ip) => ip,
        Err(err) => return abuse_response(err),
    };

    let token = payload.captcha_token.as_deref().unwrap_or("");
    if let Err(err) = state.gate.verify_captcha(token, &ip, "auth:register").await {
        return abuse_response(err);
    }

    if !payload.email.contains('@') {
        state
            .blocker
            .record_failed_attempt(&ip, "Registration with malformed email");
        return (StatusCode::BAD_REQUEST, "A valid email address is required").into_response();
    }
    if payload.password.len() < 8 {
        state
            .blocker
            .record_failed_attempt(&ip, "Registration with weak password");
        return (
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters",
        )
            .into_response();
    }

    match state.users.entry(payload.email.clone()) {
        Entry::Occupied(_) => {
            state.blocker.record_failed_attempt(
                &ip,
                &format!("Registration with existing email: {}", payload.email),
            );
            (StatusCode::BAD_REQUEST, "Email already registered").into_response()
        }
        Entry::Vacant(entry) => {
            let id = Uuid::new_v4();
            entry.insert(Account {
                id,
                email: payload.email.clone(),
                name: payload.name,
                password_digest: digest_password(&payload.password),
            });
            tracing::info!("Account registered: {}", payload.email);

            (
                StatusCode::CREATED,
                Json(serde_json::json!({
                    "id": id,
                    "email": payload.email,
                })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Response {
    let ip = match state.gate.admit(
        &headers,
        Some(addr),
        "auth",
        "login",
        ActivityKind::LoginAttempt,
    ) {
        Ok(ip) => ip,
        Err(err) => return abuse_response(err),
    };

    let digest = digest_password(&payload.password);
    let account = state
        .users
        .get(&payload.email)
        .filter(|a| a.password_digest == digest)
        .map(|a| a.value().clone());

    let Some(account) = account else {
        state
            .blocker
            .record_failed_attempt(&ip, &format!("Invalid credentials for {}", payload.email));
        return (StatusCode::UNAUTHORIZED, "Invalid email or password").into_response();
    };

    // success leaves no trace beyond the admission record
    Json(serde_json::json!({
        "token": generate_session_token(),
        "user": {
            "id": account.id,
            "email": account.email,
        }
    }))
    .into_response()
}

// Helper functions

/// Stub digest for the demo store; real credential hashing belongs to the
/// identity service this store stands in for
fn digest_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn generate_session_token() -> String {
    format!("prahari_{}", Uuid::new_v4().to_string().replace('-', ""))
}
