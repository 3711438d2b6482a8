//! Router-level tests that need no database.
//!
//! The pool is created lazily and never connected, so only routes that turn
//! a request away before touching `PostgreSQL` are exercised here. Sessions
//! live in memory.

#![allow(clippy::unwrap_used)]

use std::path::Path;

use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::TestServer;
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use tempfile::TempDir;
use tower_sessions::MemoryStore;

use delicious_web::{
    config::{AppConfig, EmailConfig, MailTransportConfig},
    middleware::{configure_sessions, request_id::REQUEST_ID_HEADER},
    router,
    state::AppState,
};

fn test_config(dir: &Path) -> AppConfig {
    AppConfig {
        database_url: SecretString::from("postgres://delicious@localhost/delicious_test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 7777,
        base_url: "http://localhost:7777".to_string(),
        session_secret: SecretString::from(
            "k8Qz2VfX7mLp4RtN9wYc3HbJ6sDg1AeU5oKi0ZxTnMvBqWjCrEyFhGdPlSaIuO7x",
        ),
        uploads_dir: dir.join("uploads"),
        auth_rate_limit: false,
        email: EmailConfig {
            transport: MailTransportConfig::File {
                dir: dir.join("mail"),
            },
            from_address: "Delicious <noreply@delicious.test>".to_string(),
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

fn server() -> (TestServer, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://delicious@localhost/delicious_test")
        .unwrap();
    let sessions = configure_sessions(MemoryStore::default(), &config).unwrap();
    let state = AppState::new(config, pool).unwrap();

    let app = router(state).layer(sessions);
    let server = TestServer::builder().save_cookies().build(app).unwrap();
    (server, dir)
}

#[tokio::test]
async fn test_health() {
    let (server, _dir) = server();

    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "ok");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (server, _dir) = server();
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let response = server
        .get("/health")
        .add_header(request_id.clone(), HeaderValue::from_static("req-42"))
        .await;
    assert_eq!(response.header(request_id.clone()), "req-42");

    let generated = server.get("/health").await;
    assert!(!generated.header(request_id).is_empty());
}

#[tokio::test]
async fn test_login_page_has_forgot_form() {
    let (server, _dir) = server();

    let response = server.get("/login").await;
    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains(r#"action="/login""#));
    assert!(body.contains(r#"action="/account/forgot""#));
}

#[tokio::test]
async fn test_guarded_page_redirects_to_login_with_flash() {
    let (server, _dir) = server();

    let response = server.get("/add").await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(response.header(header::LOCATION), "/login");

    let login = server.get("/login").await;
    assert!(
        login
            .text()
            .contains("Oops, You must be logged in to view this page!")
    );

    // Flashes are shown once
    let again = server.get("/login").await;
    assert!(!again.text().contains("Oops, You must be logged in"));
}

#[tokio::test]
async fn test_api_heart_requires_login() {
    let (server, _dir) = server();

    let response = server.post("/api/stores/1/heart").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    // No login-required flash is queued for API callers.
    let login = server.get("/login").await;
    assert!(!login.text().contains("You must be logged in"));
}

#[tokio::test]
async fn test_logout_flashes_goodbye() {
    let (server, _dir) = server();

    let response = server.get("/logout").await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(response.header(header::LOCATION), "/");

    let page = server.get("/register").await;
    assert!(page.text().contains("You have been logged out successfully"));
}

#[tokio::test]
async fn test_register_rejects_mismatched_passwords() {
    let (server, _dir) = server();

    let response = server
        .post("/register")
        .add_header(
            header::REFERER,
            HeaderValue::from_static("http://localhost:7777/register"),
        )
        .form(&[
            ("name", "Wes"),
            ("email", "wes@example.com"),
            ("password", "correct horse"),
            ("password-confirm", "correct horse "),
        ])
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(response.header(header::LOCATION), "/register");

    let page = server.get("/register").await;
    assert!(page.text().contains("Passwords do not match!"));
}

#[tokio::test]
async fn test_reset_rejects_mismatched_passwords_before_token_lookup() {
    let (server, _dir) = server();

    let response = server
        .post("/account/reset/abc123")
        .add_header(
            header::REFERER,
            HeaderValue::from_static("http://localhost:7777/account/reset/abc123"),
        )
        .form(&[("password", "hunter22"), ("password-confirm", "hunter23")])
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(response.header(header::LOCATION), "/account/reset/abc123");
}

#[tokio::test]
async fn test_near_requires_coordinates() {
    let (server, _dir) = server();

    let response = server.get("/api/stores/near").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_upload_is_not_found() {
    let (server, _dir) = server();

    let response = server.get("/uploads/nope.png").await;
    response.assert_status_not_found();
}
