//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Store listing (page 1)
//! GET  /stores                    - Store listing
//! GET  /stores/page/{page}        - Store listing page
//! GET  /store/{slug}              - Store detail with reviews
//! GET  /tags                      - Tag list and stores with any tag
//! GET  /tags/{tag}                - Tag list and stores with the tag
//! GET  /top                       - Top-rated stores
//! GET  /health                    - Liveness
//! GET  /health/ready              - Readiness (database)
//!
//! # Stores (requires auth)
//! GET  /add                       - New-store form
//! POST /add                       - Create store (multipart)
//! GET  /stores/{id}/edit          - Edit form (author only)
//! POST /add/{id}                  - Update store (author only, multipart)
//! POST /reviews/{store_id}        - Add review
//! GET  /hearts                    - Hearted stores
//!
//! # Auth
//! GET  /login                     - Login page (with forgot-password form)
//! POST /login                     - Login action (rate limited)
//! GET  /register                  - Register page
//! POST /register                  - Register action
//! GET  /logout                    - Logout action
//!
//! # Account
//! GET  /account                   - Account form (requires auth)
//! POST /account                   - Update name and email (requires auth)
//! POST /account/forgot            - Email a reset link (rate limited)
//! GET  /account/reset/{token}     - Reset form
//! POST /account/reset/{token}     - Set the new password
//!
//! # JSON API
//! GET  /api/search?q=             - Full-text store search
//! GET  /api/stores/near?lat=&lng= - Stores within 10 km
//! POST /api/stores/{id}/heart     - Toggle a heart (requires auth)
//! ```

pub mod account;
pub mod api;
pub mod auth;
pub mod health;
pub mod reviews;
pub mod stores;
pub mod tags;

use axum::{
    Router,
    response::{IntoResponse, Redirect, Response},
    routing::{MethodRouter, get, post},
};
use tower_sessions::Session;

use crate::config::AppConfig;
use crate::error::Result;
use crate::middleware::{FlashLevel, auth_rate_limiter, flash};
use crate::state::AppState;

/// Queue a flash message and redirect.
///
/// # Errors
///
/// Returns an error if the session cannot be written.
pub async fn flash_redirect(
    session: &Session,
    level: FlashLevel,
    text: impl Into<String>,
    to: &str,
) -> Result<Response> {
    flash::push(session, level, text).await?;
    Ok(Redirect::to(to).into_response())
}

fn rate_limited(route: MethodRouter<AppState>, enabled: bool) -> MethodRouter<AppState> {
    if enabled {
        route.layer(auth_rate_limiter())
    } else {
        route
    }
}

/// Create the store routes router.
pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(stores::index))
        .route("/stores", get(stores::index))
        .route("/stores/page/{page}", get(stores::page))
        .route("/stores/{id}/edit", get(stores::edit_page))
        .route("/add", get(stores::add_page).post(stores::create))
        .route("/add/{id}", post(stores::update))
        .route("/store/{slug}", get(stores::show))
        .route("/top", get(stores::top))
        .route("/hearts", get(stores::hearts))
        .route("/reviews/{store_id}", post(reviews::add))
        .route("/tags", get(tags::index))
        .route("/tags/{tag}", get(tags::by_tag))
}

/// Create the auth and account routes router.
pub fn auth_routes(config: &AppConfig) -> Router<AppState> {
    let limit = config.auth_rate_limit;

    Router::new()
        .route(
            "/login",
            get(auth::login_page).merge(rate_limited(post(auth::login), limit)),
        )
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", get(auth::logout))
        .route(
            "/account",
            get(account::account_page).post(account::update_account),
        )
        .route(
            "/account/forgot",
            rate_limited(post(account::forgot), limit),
        )
        .route(
            "/account/reset/{token}",
            get(account::reset_page).post(account::reset),
        )
}

/// Create the JSON API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/search", get(api::search))
        .route("/stores/near", get(api::near))
        .route("/stores/{id}/heart", post(api::heart))
}

/// Create all routes.
pub fn routes(config: &AppConfig) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(store_routes())
        .merge(auth_routes(config))
        .nest("/api", api_routes())
}
