#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use bookshelf::audit::{AuditEvent, ChannelAuditSink};
use bookshelf::cache::{Cache, MemoryCache};
use bookshelf::password::PasswordHasher;
use bookshelf::{ServerConfig, create_app, db::Database};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const JWT_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub cache: MemoryCache,
    pub audit_rx: mpsc::Receiver<AuditEvent>,
}

/// Config with cheap hashing and limits high enough not to interfere.
pub fn test_config(db: Database, cache: MemoryCache) -> (ServerConfig, mpsc::Receiver<AuditEvent>) {
    let hasher = PasswordHasher::with_params(b"test-password-salt", 64, 1)
        .expect("Failed to build hasher");
    let (audit, audit_rx) = ChannelAuditSink::new(1024);

    let mut config = ServerConfig::new(db, JWT_SECRET.to_vec(), hasher, Arc::new(cache));
    config.audit = Arc::new(audit);
    config.rate_limit_per_second = 1000;
    config.rate_limit_burst = 1000;
    (config, audit_rx)
}

pub async fn setup() -> TestApp {
    setup_with(|_| {}).await
}

/// Build an app after letting the caller adjust the config.
pub async fn setup_with(adjust: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let cache = MemoryCache::new();
    let (mut config, audit_rx) = test_config(db.clone(), cache.clone());
    adjust(&mut config);

    TestApp {
        app: create_app(&config),
        db,
        cache,
        audit_rx,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: Value,
}

impl TestResponse {
    /// Value of the refresh_token cookie set by this response, if any.
    pub fn refresh_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|v| v.strip_prefix("refresh_token="))
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }
}

pub fn json_request(method: &str, uri: &str, body: Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn refresh_request(refresh_token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/auth/refresh")
        .header(header::COOKIE, format!("refresh_token={}", refresh_token))
        .body(Body::empty())
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };

    TestResponse {
        status,
        headers,
        json,
    }
}

pub async fn sign_up(app: &TestApp, username: &str, password: &str) -> TestResponse {
    send(
        &app.app,
        json_request(
            "POST",
            "/api/auth/sign-up",
            serde_json::json!({ "username": username, "password": password }),
            None,
        ),
    )
    .await
}

pub async fn sign_in(app: &TestApp, username: &str, password: &str) -> TestResponse {
    send(
        &app.app,
        json_request(
            "POST",
            "/api/auth/sign-in",
            serde_json::json!({ "username": username, "password": password }),
            None,
        ),
    )
    .await
}

pub async fn verify(app: &TestApp, username: &str, code: &str) -> TestResponse {
    send(
        &app.app,
        json_request(
            "POST",
            "/api/auth/verify",
            serde_json::json!({ "username": username, "code": code }),
            None,
        ),
    )
    .await
}

/// The verification code currently stored for `username`.
pub async fn pending_code(app: &TestApp, username: &str) -> Option<String> {
    app.cache.get(username).await.unwrap()
}

/// Sign up, verify and sign in. Returns (access token, refresh token).
pub async fn register(app: &TestApp, username: &str, password: &str) -> (String, String) {
    assert_eq!(sign_up(app, username, password).await.status, StatusCode::CREATED);

    let code = pending_code(app, username)
        .await
        .expect("sign-up should store a code");
    assert_eq!(verify(app, username, &code).await.status, StatusCode::OK);

    let response = sign_in(app, username, password).await;
    assert_eq!(response.status, StatusCode::OK);

    let access = response.json["access_token"]
        .as_str()
        .expect("access token in body")
        .to_string();
    let refresh = response.refresh_cookie().expect("refresh cookie");
    (access, refresh)
}
