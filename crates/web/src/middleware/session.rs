//! Session middleware configuration.
//!
//! Sessions live in `PostgreSQL` (`tower_sessions.session`) and the cookie
//! carrying the session ID is signed with `DELICIOUS_SESSION_SECRET`.

use secrecy::ExposeSecret;
use sqlx::PgPool;
use tower_sessions::{
    Expiry, SessionManagerLayer, SessionStore,
    cookie::{Key, KeyError, SameSite, time::Duration},
    service::SignedCookie,
};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::AppConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "delicious_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Session layer as mounted by the server.
pub type AppSessionLayer = SessionManagerLayer<PostgresStore, SignedCookie>;

/// Build a signed session layer over any store.
///
/// # Errors
///
/// Returns an error if the session secret is too short to derive a key.
pub fn configure<S: SessionStore>(
    store: S,
    config: &AppConfig,
) -> Result<SessionManagerLayer<S, SignedCookie>, KeyError> {
    let key = Key::try_from(config.session_secret.expose_secret().as_bytes())?;

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(
            SESSION_EXPIRY_SECONDS,
        )))
        .with_secure(config.is_secure())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(key))
}

/// Create the session layer with `PostgreSQL` store.
///
/// The session table must already exist (see the migrations).
///
/// # Errors
///
/// Returns an error if the session secret is too short to derive a key.
pub fn create_session_layer(pool: &PgPool, config: &AppConfig) -> Result<AppSessionLayer, KeyError> {
    configure(PostgresStore::new(pool.clone()), config)
}
