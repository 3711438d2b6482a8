//! One-shot flash messages kept in the session.
//!
//! A handler queues a message and redirects; the next rendered page takes
//! every queued message and shows it once.

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::models::{CurrentUser, session_keys};

/// Severity of a flash message, used as its CSS modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
    Info,
}

impl FlashLevel {
    /// Lower-case name, as used in templates.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

/// A message shown once on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub text: String,
}

/// Queue a flash message.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn push(
    session: &Session,
    level: FlashLevel,
    text: impl Into<String>,
) -> Result<(), tower_sessions::session::Error> {
    let mut pending: Vec<FlashMessage> = session.get(session_keys::FLASH).await?.unwrap_or_default();
    pending.push(FlashMessage {
        level,
        text: text.into(),
    });
    session.insert(session_keys::FLASH, pending).await
}

/// Queue an error message.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn error(
    session: &Session,
    text: impl Into<String>,
) -> Result<(), tower_sessions::session::Error> {
    push(session, FlashLevel::Error, text).await
}

/// Remove and return every queued message.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn take(session: &Session) -> Result<Vec<FlashMessage>, tower_sessions::session::Error> {
    Ok(session
        .remove::<Vec<FlashMessage>>(session_keys::FLASH)
        .await?
        .unwrap_or_default())
}

/// Per-request data every page template needs.
///
/// Extracting it consumes the pending flash messages, so only handlers that
/// render HTML should ask for it.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    /// Logged-in user, if any.
    pub current_user: Option<CurrentUser>,
    /// Messages to show on this page.
    pub flashes: Vec<FlashMessage>,
    /// Request path, for highlighting the active nav item.
    pub path: String,
}

impl PageContext {
    /// Build the context from a session, consuming its flash messages.
    pub async fn load(session: Option<&Session>, path: impl Into<String>) -> Self {
        let path = path.into();
        let Some(session) = session else {
            return Self {
                path,
                ..Self::default()
            };
        };

        let current_user = session
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten();
        let flashes = take(session).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not read flash messages");
            Vec::new()
        });

        Self {
            current_user,
            flashes,
            path,
        }
    }

    /// Whether someone is logged in.
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        self.current_user.is_some()
    }

    /// Whether `prefix` is the current section, for nav highlighting.
    #[must_use]
    pub fn is_active(&self, prefix: &str) -> bool {
        if prefix == "/" {
            self.path == "/"
        } else {
            self.path.starts_with(prefix)
        }
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::load(parts.extensions.get::<Session>(), parts.uri.path()).await)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_flashes_are_taken_once_in_order() {
        let session = session();
        push(&session, FlashLevel::Success, "first").await.unwrap();
        error(&session, "second").await.unwrap();

        let taken = take(&session).await.unwrap();
        assert_eq!(
            taken,
            [
                FlashMessage {
                    level: FlashLevel::Success,
                    text: "first".to_string()
                },
                FlashMessage {
                    level: FlashLevel::Error,
                    text: "second".to_string()
                },
            ]
        );
        assert!(take(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_page_context_takes_flashes() {
        let session = session();
        push(&session, FlashLevel::Success, "Review Saved!").await.unwrap();

        let ctx = PageContext::load(Some(&session), "/store/omars").await;
        assert_eq!(ctx.flashes.len(), 1);
        assert!(!ctx.is_logged_in());
        assert!(ctx.is_active("/store"));
        assert!(!ctx.is_active("/"));

        let again = PageContext::load(Some(&session), "/").await;
        assert!(again.flashes.is_empty());
        assert!(again.is_active("/"));
    }

    #[test]
    fn test_level_names() {
        assert_eq!(FlashLevel::Success.as_str(), "success");
        assert_eq!(
            serde_json::to_string(&FlashLevel::Error).unwrap(),
            "\"error\""
        );
    }
}
