//! Password-confirmation guard for forms.

use axum::{
    extract::{Form, FromRequest, Request},
    http::{HeaderMap, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::de::DeserializeOwned;
use tower_sessions::Session;

use super::flash;

/// Shown when the two password fields differ.
pub const PASSWORDS_DO_NOT_MATCH: &str = "Passwords do not match!";

/// Forms carrying a password and its confirmation.
pub trait PasswordConfirmation {
    /// The `password` field.
    fn password(&self) -> &str;
    /// The `password-confirm` field.
    fn password_confirm(&self) -> &str;
}

/// Form extractor that only succeeds when `password` and `password-confirm`
/// are identical.
///
/// On a mismatch it flashes an error and redirects back to the page the form
/// was posted from, before the handler runs.
pub struct ConfirmedPasswords<T>(pub T);

/// Byte-for-byte comparison of the two fields.
#[must_use]
pub fn passwords_match(password: &str, confirm: &str) -> bool {
    password.as_bytes() == confirm.as_bytes()
}

/// Same-site path to send the user back to, taken from `Referer`.
///
/// Only the path and query are kept, so a forged header cannot redirect
/// off-site.
#[must_use]
pub fn back_path(headers: &HeaderMap) -> String {
    headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(|referer| url::Url::parse(referer).ok())
        .map(|url| match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        })
        .filter(|path| path.starts_with('/') && !path.starts_with("//"))
        .unwrap_or_else(|| "/".to_string())
}

impl<S, T> FromRequest<S> for ConfirmedPasswords<T>
where
    S: Send + Sync,
    T: DeserializeOwned + PasswordConfirmation + Send,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let session = req.extensions().get::<Session>().cloned();
        let back = back_path(req.headers());

        let Form(form) = Form::<T>::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        if passwords_match(form.password(), form.password_confirm()) {
            return Ok(Self(form));
        }

        if let Some(session) = session
            && let Err(e) = flash::error(&session, PASSWORDS_DO_NOT_MATCH).await
        {
            tracing::warn!(error = %e, "Could not flash password mismatch");
        }
        Err(Redirect::to(&back).into_response())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_passwords_match_is_exact() {
        assert!(passwords_match("hunter22", "hunter22"));
        assert!(!passwords_match("hunter22", "hunter22 "));
        assert!(!passwords_match("Hunter22", "hunter22"));
        assert!(!passwords_match("e\u{301}", "\u{e9}"));
        assert!(passwords_match("", ""));
    }

    #[test]
    fn test_back_path_uses_referer_path() {
        let mut headers = HeaderMap::new();
        assert_eq!(back_path(&headers), "/");

        headers.insert(
            header::REFERER,
            HeaderValue::from_static("http://localhost:7777/account/reset/abc?x=1"),
        );
        assert_eq!(back_path(&headers), "/account/reset/abc?x=1");

        headers.insert(
            header::REFERER,
            HeaderValue::from_static("https://evil.example/register"),
        );
        assert_eq!(back_path(&headers), "/register");

        headers.insert(header::REFERER, HeaderValue::from_static("not a url"));
        assert_eq!(back_path(&headers), "/");
    }
}
