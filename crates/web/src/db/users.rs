//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use delicious_core::{Email, UserId};

use super::RepositoryError;
use crate::models::User;

/// Columns selected for every `User` read.
const USER_COLUMNS: &str = "id, name, email, created_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    email: Email,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// Create a new user with a password.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, "email already exists"))?;

        Ok(row.into())
    }

    /// Get a user and their password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithHashRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| (r.user.into(), r.password_hash)))
    }

    /// Update a user's name and email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if another user has the email.
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn update_profile(
        &self,
        id: UserId,
        name: &str,
        email: &Email,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE users
            SET name = $2, email = $3
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(name)
        .bind(email)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, "email already exists"))?;

        row.map(User::from).ok_or(RepositoryError::NotFound)
    }

    /// Store a password-reset token, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn set_reset_token(
        &self,
        id: UserId,
        token: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET reset_password_token = $2, reset_password_expires = $3
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(token)
        .bind(expires)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Find the user holding `token`, provided it expires after `now`.
    ///
    /// A wrong token and an expired one are indistinguishable to the caller.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_valid_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE reset_password_token = $1
              AND reset_password_expires > $2
            "
        ))
        .bind(token)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// Set a new password hash for the holder of `token` and clear both
    /// reset-token fields, provided the token still expires after `now`.
    ///
    /// The token check and the update are one statement, so a token can be
    /// consumed once. Returns `None` if the token is unknown, expired, or
    /// already used.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reset_password(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE users
            SET password_hash = $2,
                reset_password_token = NULL,
                reset_password_expires = NULL
            WHERE reset_password_token = $1
              AND reset_password_expires > $3
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(token)
        .bind(password_hash)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// Create or replace a user by email. Used when seeding.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (email)
            DO UPDATE SET name = EXCLUDED.name, password_hash = EXCLUDED.password_hash
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL (DATABASE_URL)"]
    async fn test_create_rejects_duplicate_email(pool: PgPool) {
        let repo = UserRepository::new(&pool);
        repo.create("Wes", &email("wes@example.com"), "hash").await.unwrap();

        let err = repo
            .create("Other", &email("WES@example.com"), "hash")
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL (DATABASE_URL)"]
    async fn test_reset_token_lookup_respects_expiry(pool: PgPool) {
        let repo = UserRepository::new(&pool);
        let user = repo.create("Wes", &email("wes@example.com"), "hash").await.unwrap();
        let now = Utc::now();

        repo.set_reset_token(user.id, "abc123", now + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(
            repo.find_by_valid_reset_token("abc123", now).await.unwrap(),
            Some(user.clone())
        );
        assert_eq!(repo.find_by_valid_reset_token("wrong", now).await.unwrap(), None);

        repo.set_reset_token(user.id, "abc123", now - Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(repo.find_by_valid_reset_token("abc123", now).await.unwrap(), None);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL (DATABASE_URL)"]
    async fn test_reset_password_clears_token(pool: PgPool) {
        let repo = UserRepository::new(&pool);
        let user = repo.create("Wes", &email("wes@example.com"), "old").await.unwrap();
        let now = Utc::now();
        repo.set_reset_token(user.id, "abc123", now + Duration::hours(1))
            .await
            .unwrap();

        let updated = repo.reset_password("abc123", "new", now).await.unwrap();
        assert_eq!(updated.map(|u| u.id), Some(user.id));

        assert_eq!(repo.find_by_valid_reset_token("abc123", now).await.unwrap(), None);
        let (_, hash) = repo
            .get_password_hash(&user.email)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hash, "new");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL (DATABASE_URL)"]
    async fn test_reset_token_is_single_use(pool: PgPool) {
        let repo = UserRepository::new(&pool);
        let user = repo.create("Wes", &email("wes@example.com"), "old").await.unwrap();
        let now = Utc::now();
        repo.set_reset_token(user.id, "abc123", now + Duration::hours(1))
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            repo.reset_password("abc123", "first", now),
            repo.reset_password("abc123", "second", now)
        );
        let winners = [first.unwrap(), second.unwrap()]
            .into_iter()
            .flatten()
            .count();
        assert_eq!(winners, 1);
        assert_eq!(repo.reset_password("abc123", "third", now).await.unwrap(), None);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL (DATABASE_URL)"]
    async fn test_reset_password_leaves_newer_token(pool: PgPool) {
        let repo = UserRepository::new(&pool);
        let user = repo.create("Wes", &email("wes@example.com"), "old").await.unwrap();
        let now = Utc::now();
        repo.set_reset_token(user.id, "stale", now + Duration::hours(1))
            .await
            .unwrap();
        // A second forgot lands before the first link is used.
        repo.set_reset_token(user.id, "fresh", now + Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(repo.reset_password("stale", "new", now).await.unwrap(), None);
        assert!(repo.find_by_valid_reset_token("fresh", now).await.unwrap().is_some());
    }
}
