//! End-to-end gate behavior through the service router

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::Router;
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use prahari_server::config::Config;
use prahari_server::routes::{app, AppState};
use std::net::SocketAddr;
use tower::ServiceExt;

fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_token: Some("test-admin".to_string()),
        hcaptcha_secret: None,
        max_failed_attempts: 10,
        block_duration_ms: 24 * 60 * 60 * 1000,
        monitoring_window_ms: 60 * 60 * 1000,
        cleanup_interval_ms: 60 * 60 * 1000,
        max_requests_per_window: 5,
        rate_window_ms: 15 * 60 * 1000,
    }
}

fn service(config: Config) -> Router {
    app(AppState::new(config))
}

fn connect_addr() -> SocketAddr {
    "127.0.0.1:4455".parse().unwrap()
}

fn post_json(uri: &str, ip: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", ip)
        .header("user-agent", "gate-flow-test")
        .extension(ConnectInfo(connect_addr()))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn admin_get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn admin_post(uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn register_then_login_roundtrip() {
    let svc = service(test_config());

    let response = svc
        .clone()
        .oneshot(post_json(
            "/api/auth/register",
            "203.0.113.7",
            serde_json::json!({
                "email": "alice@example.com",
                "password": "correct horse",
                "name": "Alice",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = svc
        .clone()
        .oneshot(post_json(
            "/api/auth/login",
            "203.0.113.7",
            serde_json::json!({ "email": "alice@example.com", "password": "correct horse" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("\"token\":\"prahari_"));

    let response = svc
        .clone()
        .oneshot(post_json(
            "/api/auth/login",
            "203.0.113.7",
            serde_json::json!({ "email": "alice@example.com", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_string(response).await, "Invalid email or password");

    let response = svc
        .clone()
        .oneshot(post_json(
            "/api/auth/register",
            "203.0.113.7",
            serde_json::json!({ "email": "alice@example.com", "password": "another pass" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "Email already registered");
}

#[tokio::test]
async fn sixth_request_within_window_is_throttled() {
    let svc = service(test_config());

    for i in 0..5 {
        let response = svc
            .clone()
            .oneshot(post_json(
                "/api/auth/register",
                "203.0.113.8",
                serde_json::json!({
                    "email": format!("user{i}@example.com"),
                    "password": "long enough",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED, "request {i}");
    }

    let response = svc
        .clone()
        .oneshot(post_json(
            "/api/auth/register",
            "203.0.113.8",
            serde_json::json!({ "email": "user6@example.com", "password": "long enough" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response.headers().get("Retry-After").unwrap().to_str().unwrap(),
        "900"
    );
    assert_eq!(
        body_string(response).await,
        "Too many requests. Try again after 15 minutes."
    );

    // a different operation from the same client is untouched
    let response = svc
        .clone()
        .oneshot(post_json(
            "/api/auth/login",
            "203.0.113.8",
            serde_json::json!({ "email": "user1@example.com", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn repeated_failed_logins_escalate_to_a_block() {
    // high request budget so the throttle stays out of the way
    let config = Config {
        max_requests_per_window: 100,
        ..test_config()
    };
    let svc = service(config);

    let response = svc
        .clone()
        .oneshot(post_json(
            "/api/auth/register",
            "203.0.113.9",
            serde_json::json!({ "email": "bob@example.com", "password": "correct horse" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // each bad login leaves a login_attempt plus a failed_attempt record;
    // with the registration's record already there, the fifth bad login
    // pushes the identity past the total-activity threshold
    for _ in 0..4 {
        let response = svc
            .clone()
            .oneshot(post_json(
                "/api/auth/login",
                "203.0.113.9",
                serde_json::json!({ "email": "bob@example.com", "password": "wrong" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = svc
        .clone()
        .oneshot(post_json(
            "/api/auth/login",
            "203.0.113.9",
            serde_json::json!({ "email": "bob@example.com", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // the block is now in place: even correct credentials are rejected
    let response = svc
        .clone()
        .oneshot(post_json(
            "/api/auth/login",
            "203.0.113.9",
            serde_json::json!({ "email": "bob@example.com", "password": "correct horse" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_string(response).await;
    assert!(body.starts_with("IP address blocked until "), "{body}");
    assert!(body.contains("Too many failed attempts"), "{body}");

    // other clients are unaffected
    let response = svc
        .clone()
        .oneshot(post_json(
            "/api/auth/login",
            "198.51.100.2",
            serde_json::json!({ "email": "bob@example.com", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_block_unblock_flow() {
    let svc = service(test_config());

    // unauthorized without or with a wrong bearer token
    let response = svc
        .clone()
        .oneshot(admin_get("/api/admin/blocked", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = svc
        .clone()
        .oneshot(admin_get("/api/admin/blocked", Some("nope")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // manual block takes effect immediately
    let response = svc
        .clone()
        .oneshot(admin_post(
            "/api/admin/block",
            "test-admin",
            serde_json::json!({ "ip": "198.51.100.9", "reason": "abuse report" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = svc
        .clone()
        .oneshot(post_json(
            "/api/auth/register",
            "198.51.100.9",
            serde_json::json!({ "email": "mallory@example.com", "password": "long enough" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_string(response).await.contains("abuse report"));

    let response = svc
        .clone()
        .oneshot(admin_get("/api/admin/blocked", Some("test-admin")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("198.51.100.9"));

    // unblock clears the way
    let response = svc
        .clone()
        .oneshot(admin_post(
            "/api/admin/unblock",
            "test-admin",
            serde_json::json!({ "ip": "198.51.100.9" }),
        ))
        .await
        .unwrap();
    assert!(body_string(response).await.contains("\"removed\":true"));

    let response = svc
        .clone()
        .oneshot(post_json(
            "/api/auth/register",
            "198.51.100.9",
            serde_json::json!({ "email": "mallory@example.com", "password": "long enough" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // unblocking again is a no-op
    let response = svc
        .clone()
        .oneshot(admin_post(
            "/api/admin/unblock",
            "test-admin",
            serde_json::json!({ "ip": "198.51.100.9" }),
        ))
        .await
        .unwrap();
    assert!(body_string(response).await.contains("\"removed\":false"));
}

#[tokio::test]
async fn captcha_token_required_when_secret_configured() {
    let config = Config {
        hcaptcha_secret: Some("secret".to_string()),
        ..test_config()
    };
    let svc = service(config);

    let response = svc
        .clone()
        .oneshot(post_json(
            "/api/auth/register",
            "203.0.113.10",
            serde_json::json!({ "email": "carol@example.com", "password": "long enough" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "CAPTCHA token is required");

    // the failure was recorded against the identity
    let response = svc
        .clone()
        .oneshot(admin_get("/api/admin/activity/203.0.113.10", Some("test-admin")))
        .await
        .unwrap();
    let body = body_string(response).await;
    assert!(body.contains("captcha_failure"), "{body}");
    assert!(body.contains("registration_attempt"), "{body}");
}

#[tokio::test]
async fn health_reports_gate_counters() {
    let svc = service(test_config());

    let response = svc
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("\"status\":\"healthy\""));
    assert!(body.contains("\"captcha\":\"disabled\""));
}
