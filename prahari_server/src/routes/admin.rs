//! Admin routes for block management and inspection
//!
//! Fail-closed: without an ADMIN_TOKEN configured, every admin request is
//! rejected.

use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/blocked", get(list_blocked))
        .route("/api/admin/block", post(block_ip))
        .route("/api/admin/unblock", post(unblock_ip))
        .route("/api/admin/activity/{ip}", get(list_activity))
}

/// Validate the admin bearer token
fn validate_admin(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return false;
    };

    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|t| t == expected)
        .unwrap_or(false)
}

/// All block records, expired or not
async fn list_blocked(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !validate_admin(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    Json(state.blocker.blocked()).into_response()
}

#[derive(Debug, Deserialize)]
struct BlockRequest {
    ip: String,
    reason: String,
}

/// Manually block an identity
async fn block_ip(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<BlockRequest>,
) -> Response {
    if !validate_admin(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    state.blocker.block(&payload.ip, &payload.reason);
    Json(serde_json::json!({ "blocked": payload.ip })).into_response()
}

#[derive(Debug, Deserialize)]
struct UnblockRequest {
    ip: String,
}

/// Lift a block; reports whether one existed
async fn unblock_ip(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UnblockRequest>,
) -> Response {
    if !validate_admin(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    let removed = state.blocker.unblock(&payload.ip);
    Json(serde_json::json!({ "ip": payload.ip, "removed": removed })).into_response()
}

/// Recorded activity for an identity
async fn list_activity(
    State(state): State<AppState>,
    Path(ip): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !validate_admin(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    Json(state.blocker.activities(&ip)).into_response()
}
