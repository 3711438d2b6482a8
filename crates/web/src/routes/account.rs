//! Account and password-reset handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use super::{auth::user_message, flash_redirect};
use crate::error::Result;
use crate::filters;
use crate::middleware::{
    ConfirmedPasswords, FlashLevel, PageContext, PasswordConfirmation, RequireAuth,
    set_current_user,
};
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

/// Account form data.
#[derive(Debug, Deserialize)]
pub struct AccountForm {
    pub name: String,
    pub email: String,
}

/// Forgot password form data.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

/// Reset password form data.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    pub password: String,
    #[serde(rename = "password-confirm")]
    pub password_confirm: String,
}

impl PasswordConfirmation for ResetPasswordForm {
    fn password(&self) -> &str {
        &self.password
    }

    fn password_confirm(&self) -> &str {
        &self.password_confirm
    }
}

/// Account page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/edit.html")]
pub struct AccountTemplate {
    pub ctx: PageContext,
    pub name: String,
    pub email: String,
}

/// Reset password page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/reset.html")]
pub struct ResetPasswordTemplate {
    pub ctx: PageContext,
    pub token: String,
}

/// Display the account form.
pub async fn account_page(
    RequireAuth(current): RequireAuth,
    State(state): State<AppState>,
    ctx: PageContext,
) -> Result<impl IntoResponse> {
    let user = AuthService::new(state.pool()).get_user(current.id).await?;

    Ok(AccountTemplate {
        ctx,
        name: user.name,
        email: String::from(user.email),
    })
}

/// Update the logged-in user's name and email.
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn update_account(
    RequireAuth(current): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AccountForm>,
) -> Result<Response> {
    match AuthService::new(state.pool())
        .update_account(current.id, &form.name, &form.email)
        .await
    {
        Ok(user) => {
            set_current_user(&session, &user).await?;
            flash_redirect(&session, FlashLevel::Success, "Updated the profile!", "/account").await
        }
        Err(e) => match user_message(&e) {
            Some(text) => flash_redirect(&session, FlashLevel::Error, text, "/account").await,
            None => Err(e.into()),
        },
    }
}

/// Issue a reset token and email the reset link.
///
/// Storage and mail failures are fatal for the request; an unknown email is
/// reported back to the user.
#[instrument(skip_all)]
pub async fn forgot(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Response> {
    let reset = match AuthService::new(state.pool())
        .request_password_reset(&form.email)
        .await
    {
        Ok(reset) => reset,
        Err(AuthError::UserNotFound) => {
            return flash_redirect(
                &session,
                FlashLevel::Error,
                "No account with that email exists",
                "/login",
            )
            .await;
        }
        Err(e) => return Err(e.into()),
    };

    let reset_url = state
        .config()
        .absolute_url(&format!("/account/reset/{}", reset.token));
    state
        .email()
        .send_password_reset(&reset.user.name, reset.user.email.as_str(), &reset_url)
        .await?;

    info!(user_id = %reset.user.id, expires = %reset.expires, "Password reset emailed");
    flash_redirect(
        &session,
        FlashLevel::Success,
        "A password reset link has been emailed to you.",
        "/login",
    )
    .await
}

/// Display the reset form if the token is valid and unexpired.
pub async fn reset_page(
    State(state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
) -> Result<Response> {
    match AuthService::new(state.pool()).find_reset_user(&token).await {
        Ok(_) => {
            let ctx = PageContext::load(Some(&session), format!("/account/reset/{token}")).await;
            Ok(ResetPasswordTemplate { ctx, token }.into_response())
        }
        Err(AuthError::InvalidResetToken) => {
            flash_redirect(
                &session,
                FlashLevel::Error,
                "Reset password token is invalid or has expired",
                "/login",
            )
            .await
        }
        Err(e) => Err(e.into()),
    }
}

/// Set the new password, consume the token, and log the user in.
#[instrument(skip_all)]
pub async fn reset(
    State(state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
    ConfirmedPasswords(form): ConfirmedPasswords<ResetPasswordForm>,
) -> Result<Response> {
    match AuthService::new(state.pool())
        .complete_password_reset(&token, &form.password)
        .await
    {
        Ok(user) => {
            set_current_user(&session, &user).await?;
            flash_redirect(
                &session,
                FlashLevel::Success,
                "Your password has been reset. You are now logged in!",
                "/",
            )
            .await
        }
        Err(AuthError::InvalidResetToken) => {
            warn!("Password reset with invalid or expired token");
            flash_redirect(
                &session,
                FlashLevel::Error,
                "Reset password token is invalid or has expired",
                "/login",
            )
            .await
        }
        Err(AuthError::WeakPassword(text)) => {
            flash_redirect(
                &session,
                FlashLevel::Error,
                text,
                &format!("/account/reset/{}", urlencoding::encode(&token)),
            )
            .await
        }
        Err(e) => Err(e.into()),
    }
}
