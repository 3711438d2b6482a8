//! Integration tests for Delicious.
//!
//! These drive a running server over HTTP. Start one against a migrated
//! database, then run the ignored tests:
//!
//! ```bash
//! cargo run -p delicious-cli -- migrate
//! cargo run -p delicious-web &
//! cargo test -p delicious-integration-tests -- --ignored
//! ```
//!
//! `DELICIOUS_TEST_URL` overrides the server address (default
//! `http://localhost:7777`). Run with `DELICIOUS_AUTH_RATE_LIMIT=false` on the
//! server, or the login tests trip the limiter.

use reqwest::{Client, Response, redirect::Policy};
use uuid::Uuid;

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("DELICIOUS_TEST_URL").unwrap_or_else(|_| "http://localhost:7777".to_string())
}

/// A browser-like client: keeps cookies, does not follow redirects.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// An email address no other test run has used.
#[must_use]
pub fn unique_email() -> String {
    format!("test-{}@delicious.test", Uuid::new_v4().simple())
}

/// `Location` header of a redirect, or an empty string.
#[must_use]
pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Absolute URL for `path`.
#[must_use]
pub fn url(path: &str) -> String {
    format!("{}{path}", base_url())
}

/// Register a fresh user on `client`, leaving it logged in.
///
/// Returns the user's email.
///
/// # Panics
///
/// Panics if the request fails or registration is refused.
pub async fn register(client: &Client, name: &str) -> String {
    let email = unique_email();
    let response = client
        .post(url("/register"))
        .header(reqwest::header::REFERER, url("/register"))
        .form(&[
            ("name", name),
            ("email", email.as_str()),
            ("password", "correct horse battery"),
            ("password-confirm", "correct horse battery"),
        ])
        .send()
        .await
        .expect("register request failed");

    assert_eq!(location(&response), "/", "registration refused");
    email
}

/// Body of the page at `path`, consuming any pending flash messages.
///
/// # Panics
///
/// Panics if the request fails.
pub async fn page(client: &Client, path: &str) -> String {
    client
        .get(url(path))
        .send()
        .await
        .expect("page request failed")
        .text()
        .await
        .expect("page body unreadable")
}
