//! Authentication service.
//!
//! Password login and registration, account edits, and the password-reset
//! flow:
//!
//! ```text
//! NoToken --forgot--> TokenIssued(expiry) --update--> Consumed (token cleared)
//!                         |   ^
//!                         |   +--forgot again: token overwritten
//!                         +--expiry passes--> Expired (lookups fail)
//! ```

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sqlx::PgPool;
use tracing::info;

use delicious_core::{Email, UserId};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::User;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Random bytes in a reset token (hex-encoded to twice as many chars).
pub const RESET_TOKEN_BYTES: usize = 20;

/// How long a reset token stays valid, in milliseconds.
pub const RESET_TOKEN_TTL_MS: i64 = 3_600_000;

/// How long a reset token stays valid.
#[must_use]
pub fn reset_token_ttl() -> Duration {
    Duration::milliseconds(RESET_TOKEN_TTL_MS)
}

/// A freshly issued password-reset token.
#[derive(Debug, Clone)]
pub struct PasswordReset {
    /// The user the token was issued to.
    pub user: User,
    /// Hex-encoded token, as it appears in the reset URL.
    pub token: String,
    /// When the token stops working.
    pub expires: DateTime<Utc>,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new user with name, email, and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::InvalidName` if the name is blank.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, AuthError> {
        let name = validate_name(name)?;
        let email = Email::parse(email)?;
        validate_password(password)?;

        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(name, &email, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Change a user's name and email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::InvalidName` if the name is blank.
    /// Returns `AuthError::UserAlreadyExists` if another account has the email.
    pub async fn update_account(
        &self,
        user_id: UserId,
        name: &str,
        email: &str,
    ) -> Result<User, AuthError> {
        let name = validate_name(name)?;
        let email = Email::parse(email)?;

        self.users
            .update_profile(user_id, name, &email)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }

    /// Issue a reset token for the account registered under `email`.
    ///
    /// Any earlier token for the account stops working.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if no account has this email
    /// (including when the input isn't an email at all).
    /// Returns `AuthError::Repository` if the token cannot be stored.
    pub async fn request_password_reset(&self, email: &str) -> Result<PasswordReset, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::UserNotFound)?;
        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let token = generate_reset_token();
        let expires = Utc::now() + reset_token_ttl();
        self.users.set_reset_token(user.id, &token, expires).await?;

        info!(user_id = %user.id, "Password reset token issued");
        Ok(PasswordReset {
            user,
            token,
            expires,
        })
    }

    /// The user holding `token`, if it has not expired.
    ///
    /// Shared by the reset form and the reset submission so both treat a
    /// wrong token and an expired one the same way.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetToken` if the token is unknown or expired.
    pub async fn find_reset_user(&self, token: &str) -> Result<User, AuthError> {
        self.users
            .find_by_valid_reset_token(token, Utc::now())
            .await?
            .ok_or(AuthError::InvalidResetToken)
    }

    /// Set a new password using a reset token, consuming the token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetToken` if the token is unknown or expired.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    pub async fn complete_password_reset(
        &self,
        token: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        self.find_reset_user(token).await?;
        validate_password(password)?;

        let password_hash = hash_password(password)?;
        // A concurrent reset may have used the token since the lookup.
        let user = self
            .users
            .reset_password(token, &password_hash, Utc::now())
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        info!(user_id = %user.id, "Password reset completed");
        Ok(user)
    }
}

/// Generate a password-reset token: [`RESET_TOKEN_BYTES`] random bytes, hex-encoded.
#[must_use]
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Trimmed, non-empty display name.
fn validate_name(name: &str) -> Result<&str, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::InvalidName("You must supply a name!".to_string()));
    }
    Ok(name)
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.is_empty() {
        return Err(AuthError::WeakPassword(
            "Password cannot be blank!".to_string(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
