//! HTTP middleware and extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. Session layer (tower-sessions, signed cookie, `PostgreSQL` store)
//! 3. `TraceLayer` (request tracing)
//! 4. Request ID (add unique ID to each request)
//! 5. Rate limiting on login and forgot-password (governor)
//!
//! # Extractors
//!
//! - [`RequireAuth`] - logged-in user from the session
//! - [`PageContext`] - current user and pending flash messages for templates
//! - [`ConfirmedPasswords`] - form whose `password` and `password-confirm` match

pub mod auth;
pub mod flash;
pub mod passwords;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{RequireAuth, clear_current_user, set_current_user};
pub use flash::{FlashLevel, FlashMessage, PageContext};
pub use passwords::{ConfirmedPasswords, PasswordConfirmation, back_path};
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
pub use session::{AppSessionLayer, configure as configure_sessions, create_session_layer};
