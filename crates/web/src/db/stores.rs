//! Store repository for database operations.
//!
//! Saving a store is the only place slugs are assigned. The first candidate
//! follows the count-based rule from [`SlugCandidates`]; if another save wins
//! the race for it, the unique index rejects ours and the next suffix is tried.

use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{instrument, warn};

use delicious_core::{GeoPoint, Slug, SlugCandidates, StoreId, UserId};

use super::{RepositoryError, ReviewRepository};
use crate::models::{
    Location, Pagination, ReviewInclusion, Store, StoreFields, TagCount, TopStore,
};

/// Unique index guarding `stores.slug`.
const SLUG_INDEX: &str = "stores_slug_key";

/// Slug candidates tried before a save gives up.
const MAX_SLUG_ATTEMPTS: usize = 8;

/// Stores need this many reviews to be ranked.
pub const TOP_STORES_MIN_REVIEWS: i64 = 2;

/// Length of the top-stores ranking.
pub const TOP_STORES_LIMIT: i64 = 10;

/// Results returned by full-text search.
pub const SEARCH_LIMIT: i64 = 5;

/// Radius of the nearby-stores lookup, in metres.
pub const NEAR_RADIUS_METERS: f64 = 10_000.0;

/// Results returned by the nearby-stores lookup.
pub const NEAR_LIMIT: i64 = 10;

const STORE_COLUMNS: &str = "s.id, s.name, s.slug, s.description, s.tags, s.created, \
                             s.lng, s.lat, s.address, s.photo, s.author_id";

#[derive(sqlx::FromRow)]
struct StoreRow {
    id: StoreId,
    name: String,
    slug: Slug,
    description: String,
    tags: Vec<String>,
    created: DateTime<Utc>,
    lng: f64,
    lat: f64,
    address: String,
    photo: Option<String>,
    author_id: UserId,
}

impl TryFrom<StoreRow> for Store {
    type Error = RepositoryError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        let point = GeoPoint::new(row.lng, row.lat).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid location for store {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            tags: row.tags,
            created: row.created,
            location: Location {
                point,
                address: row.address,
            },
            photo: row.photo,
            author: row.author_id,
            reviews: None,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TopStoreRow {
    id: StoreId,
    name: String,
    slug: Slug,
    photo: Option<String>,
    review_count: i64,
    average_rating: f64,
}

fn into_stores(rows: Vec<StoreRow>) -> Result<Vec<Store>, RepositoryError> {
    rows.into_iter().map(Store::try_from).collect()
}

fn is_slug_conflict(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err)
            if db_err.is_unique_violation() && db_err.constraint() == Some(SLUG_INDEX)
    )
}

/// Repository for store database operations.
pub struct StoreRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreRepository<'a> {
    /// Create a new store repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Count stores whose slug is `base` or `base-N`, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_slug_family(
        &self,
        base: &Slug,
        exclude: Option<StoreId>,
    ) -> Result<u32, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM stores
            WHERE slug ~* $1
              AND ($2::INTEGER IS NULL OR id <> $2)
            ",
        )
        .bind(base.family_pattern())
        .bind(exclude)
        .fetch_one(self.pool)
        .await?;

        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Run `save` with successive slug candidates for `name` until one is
    /// accepted by the unique index.
    async fn save_with_unique_slug<F, Fut>(
        &self,
        name: &str,
        exclude: Option<StoreId>,
        mut save: F,
    ) -> Result<StoreRow, RepositoryError>
    where
        F: FnMut(Slug) -> Fut,
        Fut: Future<Output = Result<StoreRow, sqlx::Error>>,
    {
        let base = Slug::from_name(name);
        let existing = self.count_slug_family(&base, exclude).await?;

        for slug in SlugCandidates::new(base, existing).take(MAX_SLUG_ATTEMPTS) {
            match save(slug.clone()).await {
                Ok(row) => return Ok(row),
                Err(e) if is_slug_conflict(&e) => {
                    warn!(slug = %slug, "Slug taken by a concurrent save, trying next suffix");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RepositoryError::Conflict(format!(
            "no free slug for {name:?} after {MAX_SLUG_ATTEMPTS} attempts"
        )))
    }

    /// Create a store owned by `author`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if no free slug was found.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip_all, fields(author = %author))]
    pub async fn create(&self, author: UserId, fields: &StoreFields) -> Result<Store, RepositoryError> {
        let pool = self.pool;
        let sql = format!(
            r"
            INSERT INTO stores AS s (name, slug, description, tags, lng, lat, address, photo, author_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {STORE_COLUMNS}
            "
        );
        let sql = sql.as_str();

        let row = self
            .save_with_unique_slug(&fields.name, None, move |slug| async move {
                sqlx::query_as::<_, StoreRow>(sql)
                    .bind(&fields.name)
                    .bind(slug)
                    .bind(&fields.description)
                    .bind(&fields.tags)
                    .bind(fields.location.point.lng())
                    .bind(fields.location.point.lat())
                    .bind(&fields.location.address)
                    .bind(&fields.photo)
                    .bind(author)
                    .fetch_one(pool)
                    .await
            })
            .await?;

        row.try_into()
    }

    /// Update a store's editable fields.
    ///
    /// The slug is recomputed only when the name changed. A `None` photo
    /// keeps the current one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store doesn't exist.
    /// Returns `RepositoryError::Conflict` if no free slug was found.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip_all, fields(store_id = %id))]
    pub async fn update(&self, id: StoreId, fields: &StoreFields) -> Result<Store, RepositoryError> {
        let current = self
            .get_by_id(id, ReviewInclusion::Exclude)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let pool = self.pool;
        let sql = format!(
            r"
            UPDATE stores AS s
            SET name = $2,
                slug = $3,
                description = $4,
                tags = $5,
                lng = $6,
                lat = $7,
                address = $8,
                photo = COALESCE($9, s.photo)
            WHERE s.id = $1
            RETURNING {STORE_COLUMNS}
            "
        );
        let sql = sql.as_str();
        let save = move |slug: Slug| async move {
            sqlx::query_as::<_, StoreRow>(sql)
                .bind(id)
                .bind(&fields.name)
                .bind(slug)
                .bind(&fields.description)
                .bind(&fields.tags)
                .bind(fields.location.point.lng())
                .bind(fields.location.point.lat())
                .bind(&fields.location.address)
                .bind(&fields.photo)
                .fetch_one(pool)
                .await
        };

        let row = if current.name == fields.name {
            save(current.slug).await?
        } else {
            self.save_with_unique_slug(&fields.name, Some(id), save)
                .await?
        };

        row.try_into()
    }

    /// Get a store by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_id(
        &self,
        id: StoreId,
        reviews: ReviewInclusion,
    ) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM stores s WHERE s.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        self.finish(row, reviews).await
    }

    /// Get a store by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_slug(
        &self,
        slug: &str,
        reviews: ReviewInclusion,
    ) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM stores s WHERE s.slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        self.finish(row, reviews).await
    }

    async fn finish(
        &self,
        row: Option<StoreRow>,
        reviews: ReviewInclusion,
    ) -> Result<Option<Store>, RepositoryError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let mut store = Store::try_from(row)?;
        if reviews == ReviewInclusion::Include {
            store.reviews = Some(ReviewRepository::new(self.pool).list_for_store(store.id).await?);
        }
        Ok(Some(store))
    }

    /// Total number of stores.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM stores")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// One page of stores, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_page(&self, page: &Pagination) -> Result<Vec<Store>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoreRow>(&format!(
            r"
            SELECT {STORE_COLUMNS}
            FROM stores s
            ORDER BY s.created DESC, s.id DESC
            LIMIT $1 OFFSET $2
            "
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        into_stores(rows)
    }

    /// Every tag in use with the number of stores carrying it, most used
    /// first and ties broken alphabetically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn tags_list(&self) -> Result<Vec<TagCount>, RepositoryError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r"
            SELECT tag, COUNT(*) AS count
            FROM stores, UNNEST(tags) AS tag
            GROUP BY tag
            ORDER BY count DESC, tag ASC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect())
    }

    /// Stores carrying `tag`, or every store with at least one tag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_tag(&self, tag: Option<&str>) -> Result<Vec<Store>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoreRow>(&format!(
            r"
            SELECT {STORE_COLUMNS}
            FROM stores s
            WHERE CASE WHEN $1::TEXT IS NULL THEN cardinality(s.tags) > 0
                       ELSE $1 = ANY(s.tags) END
            ORDER BY s.created DESC, s.id DESC
            "
        ))
        .bind(tag)
        .fetch_all(self.pool)
        .await?;

        into_stores(rows)
    }

    /// Highest-rated stores with at least [`TOP_STORES_MIN_REVIEWS`] reviews.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_stores(&self) -> Result<Vec<TopStore>, RepositoryError> {
        let rows = sqlx::query_as::<_, TopStoreRow>(
            r"
            SELECT s.id, s.name, s.slug, s.photo,
                   COUNT(r.id) AS review_count,
                   AVG(r.rating)::FLOAT8 AS average_rating
            FROM stores s
            JOIN reviews r ON r.store_id = s.id
            GROUP BY s.id
            HAVING COUNT(r.id) >= $1
            ORDER BY average_rating DESC, review_count DESC, s.id ASC
            LIMIT $2
            ",
        )
        .bind(TOP_STORES_MIN_REVIEWS)
        .bind(TOP_STORES_LIMIT)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| TopStore {
                id: r.id,
                name: r.name,
                slug: r.slug,
                photo: r.photo,
                review_count: r.review_count,
                average_rating: r.average_rating,
            })
            .collect())
    }

    /// Full-text search over name and description, best match first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<Store>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoreRow>(&format!(
            r"
            SELECT {STORE_COLUMNS}
            FROM stores s, websearch_to_tsquery('english', $1) AS q
            WHERE s.search @@ q
            ORDER BY ts_rank(s.search, q) DESC, s.id ASC
            LIMIT $2
            "
        ))
        .bind(query)
        .bind(SEARCH_LIMIT)
        .fetch_all(self.pool)
        .await?;

        into_stores(rows)
    }

    /// Stores within [`NEAR_RADIUS_METERS`] of `point`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn near(&self, point: GeoPoint) -> Result<Vec<Store>, RepositoryError> {
        // earth_box prefilters through the GiST index; earth_distance trims
        // the box corners.
        let rows = sqlx::query_as::<_, StoreRow>(&format!(
            r"
            SELECT {STORE_COLUMNS}
            FROM stores s
            WHERE earth_box(ll_to_earth($2, $1), $3) @> ll_to_earth(s.lat, s.lng)
              AND earth_distance(ll_to_earth($2, $1), ll_to_earth(s.lat, s.lng)) <= $3
            ORDER BY earth_distance(ll_to_earth($2, $1), ll_to_earth(s.lat, s.lng)) ASC
            LIMIT $4
            "
        ))
        .bind(point.lng())
        .bind(point.lat())
        .bind(NEAR_RADIUS_METERS)
        .bind(NEAR_LIMIT)
        .fetch_all(self.pool)
        .await?;

        into_stores(rows)
    }

    /// Stores `user` has hearted, most recent heart first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn hearted_by(&self, user: UserId) -> Result<Vec<Store>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoreRow>(&format!(
            r"
            SELECT {STORE_COLUMNS}
            FROM stores s
            JOIN hearts h ON h.store_id = s.id
            WHERE h.user_id = $1
            ORDER BY h.created_at DESC, s.id DESC
            "
        ))
        .bind(user)
        .fetch_all(self.pool)
        .await?;

        into_stores(rows)
    }

    /// Delete every store, with their reviews and hearts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM stores")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use delicious_core::{Email, Rating};

    use super::*;
    use crate::db::UserRepository;
    use crate::models::NewReview;

    async fn user(pool: &PgPool, email: &str) -> UserId {
        UserRepository::new(pool)
            .create("Tester", &Email::parse(email).unwrap(), "hash")
            .await
            .unwrap()
            .id
    }

    fn fields(name: &str, tags: &[&str], lng: f64, lat: f64) -> StoreFields {
        StoreFields {
            name: name.to_string(),
            description: format!("{name} serves food"),
            tags: tags.iter().map(ToString::to_string).collect(),
            location: Location {
                point: GeoPoint::new(lng, lat).unwrap(),
                address: "1 Main St".to_string(),
            },
            photo: None,
        }
    }

    async fn review(pool: &PgPool, store: StoreId, author: UserId, rating: i64) {
        ReviewRepository::new(pool)
            .create(&NewReview {
                store,
                author,
                text: "Nice".to_string(),
                rating: Rating::new(rating).unwrap(),
            })
            .await
            .unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL (DATABASE_URL)"]
    async fn test_sequential_saves_get_numbered_slugs(pool: PgPool) {
        let author = user(&pool, "a@example.com").await;
        let repo = StoreRepository::new(&pool);

        let first = repo.create(author, &fields("Omar", &[], 0.0, 0.0)).await.unwrap();
        let second = repo.create(author, &fields("Omar", &[], 0.0, 0.0)).await.unwrap();
        let third = repo.create(author, &fields("OMAR", &[], 0.0, 0.0)).await.unwrap();

        assert_eq!(first.slug.as_str(), "omar");
        assert_eq!(second.slug.as_str(), "omar-2");
        assert_eq!(third.slug.as_str(), "omar-3");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL (DATABASE_URL)"]
    async fn test_update_keeps_slug_unless_name_changes(pool: PgPool) {
        let author = user(&pool, "a@example.com").await;
        let repo = StoreRepository::new(&pool);
        let store = repo.create(author, &fields("Omar", &[], 0.0, 0.0)).await.unwrap();

        let mut changed = fields("Omar", &["Wifi"], 1.0, 1.0);
        let updated = repo.update(store.id, &changed).await.unwrap();
        assert_eq!(updated.slug.as_str(), "omar");
        assert_eq!(updated.tags, ["Wifi"]);

        changed.name = "Omar's Place".to_string();
        let renamed = repo.update(store.id, &changed).await.unwrap();
        assert_eq!(renamed.slug.as_str(), "omars-place");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL (DATABASE_URL)"]
    async fn test_concurrent_saves_never_share_a_slug(pool: PgPool) {
        let author = user(&pool, "a@example.com").await;
        let repo = StoreRepository::new(&pool);
        let f = fields("Race", &[], 0.0, 0.0);

        let (a, b, c) = tokio::join!(
            repo.create(author, &f),
            repo.create(author, &f),
            repo.create(author, &f)
        );
        let mut slugs = vec![
            a.unwrap().slug.into_inner(),
            b.unwrap().slug.into_inner(),
            c.unwrap().slug.into_inner(),
        ];
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), 3);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL (DATABASE_URL)"]
    async fn test_tags_list_counts(pool: PgPool) {
        let author = user(&pool, "a@example.com").await;
        let repo = StoreRepository::new(&pool);
        repo.create(author, &fields("A", &["Wifi", "Licensed"], 0.0, 0.0)).await.unwrap();
        repo.create(author, &fields("B", &["Wifi"], 0.0, 0.0)).await.unwrap();
        repo.create(author, &fields("C", &["Vegetarian", "Wifi"], 0.0, 0.0)).await.unwrap();
        repo.create(author, &fields("D", &[], 0.0, 0.0)).await.unwrap();

        let tags = repo.tags_list().await.unwrap();
        let total: i64 = tags.iter().map(|t| t.count).sum();
        assert_eq!(total, 5);
        assert!(tags.windows(2).all(|w| w[0].count >= w[1].count));
        assert_eq!(tags[0], TagCount { tag: "Wifi".to_string(), count: 3 });
        // Ties are alphabetical.
        assert_eq!(tags[1].tag, "Licensed");
        assert_eq!(tags[2].tag, "Vegetarian");

        assert_eq!(repo.list_by_tag(Some("Wifi")).await.unwrap().len(), 3);
        assert_eq!(repo.list_by_tag(None).await.unwrap().len(), 3);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL (DATABASE_URL)"]
    async fn test_top_stores_requires_two_reviews(pool: PgPool) {
        let author = user(&pool, "a@example.com").await;
        let reviewer = user(&pool, "b@example.com").await;
        let repo = StoreRepository::new(&pool);

        let lonely = repo.create(author, &fields("Lonely", &[], 0.0, 0.0)).await.unwrap();
        let good = repo.create(author, &fields("Good", &[], 0.0, 0.0)).await.unwrap();
        let great = repo.create(author, &fields("Great", &[], 0.0, 0.0)).await.unwrap();

        review(&pool, lonely.id, reviewer, 5).await;
        review(&pool, good.id, reviewer, 3).await;
        review(&pool, good.id, author, 4).await;
        review(&pool, great.id, reviewer, 5).await;
        review(&pool, great.id, author, 4).await;

        let top = repo.top_stores().await.unwrap();
        assert_eq!(top.len(), 2);
        assert!(top.iter().all(|t| t.review_count >= TOP_STORES_MIN_REVIEWS));
        assert!(top.windows(2).all(|w| w[0].average_rating >= w[1].average_rating));
        assert_eq!(top[0].id, great.id);
        assert!((top[0].average_rating - 4.5).abs() < f64::EPSILON);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL (DATABASE_URL)"]
    async fn test_get_by_slug_review_inclusion(pool: PgPool) {
        let author = user(&pool, "a@example.com").await;
        let repo = StoreRepository::new(&pool);
        let store = repo.create(author, &fields("Omar", &[], 0.0, 0.0)).await.unwrap();
        review(&pool, store.id, author, 4).await;

        let without = repo
            .get_by_slug("omar", ReviewInclusion::Exclude)
            .await
            .unwrap()
            .unwrap();
        assert!(without.reviews.is_none());

        let with = repo
            .get_by_slug("omar", ReviewInclusion::Include)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(with.reviews().len(), 1);
        assert_eq!(with.reviews()[0].author.name, "Tester");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires PostgreSQL (DATABASE_URL)"]
    async fn test_search_and_near(pool: PgPool) {
        let author = user(&pool, "a@example.com").await;
        let repo = StoreRepository::new(&pool);
        // Toronto, and Hamilton (~60 km away).
        repo.create(author, &fields("Falafel House", &[], -79.3832, 43.6532)).await.unwrap();
        repo.create(author, &fields("Pizza Place", &[], -79.8711, 43.2557)).await.unwrap();

        let found = repo.search("falafel").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Falafel House");

        let near = repo
            .near(GeoPoint::new(-79.38, 43.65).unwrap())
            .await
            .unwrap();
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].name, "Falafel House");
    }
}
