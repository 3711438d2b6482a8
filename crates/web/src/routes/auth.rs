//! Login, registration, and logout handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use super::flash_redirect;
use crate::error::Result;
use crate::filters;
use crate::middleware::{
    ConfirmedPasswords, FlashLevel, PageContext, PasswordConfirmation, clear_current_user,
    set_current_user,
};
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "password-confirm")]
    pub password_confirm: String,
}

impl PasswordConfirmation for RegisterForm {
    fn password(&self) -> &str {
        &self.password
    }

    fn password_confirm(&self) -> &str {
        &self.password_confirm
    }
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub ctx: PageContext,
}

/// Flash text for auth failures the user can fix, or `None` for
/// infrastructure errors.
pub(crate) fn user_message(err: &AuthError) -> Option<String> {
    match err {
        AuthError::InvalidEmail(_) => Some("That Email is not valid!".to_string()),
        AuthError::InvalidName(msg) | AuthError::WeakPassword(msg) => Some(msg.clone()),
        AuthError::UserAlreadyExists => {
            Some("An account with that email already exists".to_string())
        }
        AuthError::InvalidCredentials => Some("Failed login".to_string()),
        AuthError::InvalidResetToken => {
            Some("Reset password token is invalid or has expired".to_string())
        }
        AuthError::UserNotFound => Some("No account with that email exists".to_string()),
        AuthError::Repository(_) | AuthError::PasswordHash => None,
    }
}

/// Display the login page.
pub async fn login_page(ctx: PageContext) -> impl IntoResponse {
    LoginTemplate { ctx }
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    match AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await
    {
        Ok(user) => {
            set_current_user(&session, &user).await?;
            tracing::info!(user_id = %user.id, "User logged in");
            flash_redirect(&session, FlashLevel::Success, "You are now logged in", "/").await
        }
        Err(AuthError::InvalidCredentials) => {
            warn!("Failed login");
            flash_redirect(&session, FlashLevel::Error, "Failed login", "/login").await
        }
        Err(e) => Err(e.into()),
    }
}

/// Display the registration page.
pub async fn register_page(ctx: PageContext) -> impl IntoResponse {
    RegisterTemplate { ctx }
}

/// Handle registration form submission.
///
/// Mismatched passwords are turned away by [`ConfirmedPasswords`] before
/// this runs. A successful registration logs the new user in.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    ConfirmedPasswords(form): ConfirmedPasswords<RegisterForm>,
) -> Result<Response> {
    match AuthService::new(state.pool())
        .register(&form.name, &form.email, &form.password)
        .await
    {
        Ok(user) => {
            set_current_user(&session, &user).await?;
            flash_redirect(&session, FlashLevel::Success, "You are now logged in", "/").await
        }
        Err(e) => match user_message(&e) {
            Some(text) => {
                warn!(error = %e, "Registration rejected");
                flash_redirect(&session, FlashLevel::Error, text, "/register").await
            }
            None => Err(e.into()),
        },
    }
}

/// Log out, keeping the session so the goodbye message survives.
pub async fn logout(session: Session) -> Result<Response> {
    clear_current_user(&session).await?;
    flash_redirect(
        &session,
        FlashLevel::Success,
        "You have been logged out successfully",
        "/",
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_infrastructure_errors() {
        assert_eq!(
            user_message(&AuthError::InvalidCredentials).as_deref(),
            Some("Failed login")
        );
        assert_eq!(
            user_message(&AuthError::InvalidName("You must supply a name!".to_string()))
                .as_deref(),
            Some("You must supply a name!")
        );
        assert!(user_message(&AuthError::PasswordHash).is_none());
    }
}
