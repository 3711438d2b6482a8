//! Delicious web application library.
//!
//! The server binary and the CLI both build on this crate: the binary mounts
//! [`router`] behind the session and Sentry layers, the CLI reuses the
//! repositories and migrations.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, extract::Request};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::state::AppState;

/// Build the application router.
///
/// Sessions are not included: the caller adds its session layer (and Sentry
/// layers) on top, so tests can swap in an in-memory store.
pub fn router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.photos().dir());

    routes::routes(state.config())
        .nest_service("/uploads", uploads)
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
