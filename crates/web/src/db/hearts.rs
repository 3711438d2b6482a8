//! Heart (favourite) repository for database operations.

use sqlx::PgPool;

use delicious_core::{StoreId, UserId};

use super::RepositoryError;

/// Repository for heart database operations.
pub struct HeartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> HeartRepository<'a> {
    /// Create a new heart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Heart `store` for `user`, or remove the heart if it is already there.
    ///
    /// Returns the user's hearted store IDs after the toggle.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn toggle(&self, user: UserId, store: StoreId) -> Result<Vec<StoreId>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM hearts WHERE user_id = $1 AND store_id = $2")
            .bind(user)
            .bind(store)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            sqlx::query(
                r"
                INSERT INTO hearts (user_id, store_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(user)
            .bind(store)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    RepositoryError::NotFound
                }
                other => RepositoryError::Database(other),
            })?;
        }

        let hearts = list_for_user(&mut *tx, user).await?;
        tx.commit().await?;
        Ok(hearts)
    }

    /// IDs of the stores `user` has hearted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user: UserId) -> Result<Vec<StoreId>, RepositoryError> {
        list_for_user(self.pool, user).await
    }
}

async fn list_for_user<'e, E>(executor: E, user: UserId) -> Result<Vec<StoreId>, RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    let ids = sqlx::query_scalar("SELECT store_id FROM hearts WHERE user_id = $1 ORDER BY store_id")
        .bind(user)
        .fetch_all(executor)
        .await?;
    Ok(ids)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use delicious_core::{Email, GeoPoint};

    use super::*;
    use crate::db::{StoreRepository, UserRepository};
    use crate::models::{Location, StoreFields};

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL (DATABASE_URL)"]
    async fn test_toggle_adds_then_removes(pool: PgPool) {
        let user = UserRepository::new(&pool)
            .create("Wes", &Email::parse("wes@example.com").unwrap(), "hash")
            .await
            .unwrap();
        let store = StoreRepository::new(&pool)
            .create(
                user.id,
                &StoreFields {
                    name: "Omar".to_string(),
                    description: String::new(),
                    tags: vec![],
                    location: Location {
                        point: GeoPoint::new(0.0, 0.0).unwrap(),
                        address: "Somewhere".to_string(),
                    },
                    photo: None,
                },
            )
            .await
            .unwrap();

        let repo = HeartRepository::new(&pool);
        assert_eq!(repo.toggle(user.id, store.id).await.unwrap(), [store.id]);
        assert!(repo.toggle(user.id, store.id).await.unwrap().is_empty());
        assert!(matches!(
            repo.toggle(user.id, StoreId::new(9999)).await,
            Err(RepositoryError::NotFound)
        ));
    }
}
