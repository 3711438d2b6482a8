//! User management commands.

use thiserror::Error;

use delicious_core::UserId;
use delicious_web::{
    db,
    services::auth::{AuthError, AuthService},
};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Registration was rejected.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Create a user with the same validation as the register form.
///
/// # Errors
///
/// Returns an error if the input is invalid, the email is taken, or the
/// database is unreachable.
pub async fn create(name: &str, email: &str, password: &str) -> Result<UserId, UserError> {
    let database_url =
        super::database_url().ok_or(UserError::MissingEnvVar("DELICIOUS_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    let user = AuthService::new(&pool)
        .register(name, email, password)
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "User created");
    Ok(user.id)
}
