//! Review repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use delicious_core::{Rating, ReviewId, StoreId, UserId};

use super::RepositoryError;
use crate::models::{NewReview, Review, ReviewAuthor};

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    store_id: StoreId,
    author_id: UserId,
    author_name: String,
    text: String,
    rating: Rating,
    created: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            store: row.store_id,
            author: ReviewAuthor {
                id: row.author_id,
                name: row.author_name,
            },
            text: row.text,
            rating: row.rating,
            created: row.created,
        }
    }
}

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Save a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r"
            WITH inserted AS (
                INSERT INTO reviews (store_id, author_id, text, rating)
                SELECT s.id, $2, $3, $4 FROM stores s WHERE s.id = $1
                RETURNING id, store_id, author_id, text, rating, created
            )
            SELECT i.id, i.store_id, i.author_id, u.name AS author_name,
                   i.text, i.rating, i.created
            FROM inserted i
            JOIN users u ON u.id = i.author_id
            ",
        )
        .bind(review.store)
        .bind(review.author)
        .bind(review.text.trim())
        .bind(review.rating)
        .fetch_optional(self.pool)
        .await?;

        row.map(Review::from).ok_or(RepositoryError::NotFound)
    }

    /// Reviews of a store with their authors, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_store(&self, store: StoreId) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r"
            SELECT r.id, r.store_id, r.author_id, u.name AS author_name,
                   r.text, r.rating, r.created
            FROM reviews r
            JOIN users u ON u.id = r.author_id
            WHERE r.store_id = $1
            ORDER BY r.created DESC, r.id DESC
            ",
        )
        .bind(store)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Review::from).collect())
    }
}
