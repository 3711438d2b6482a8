//! Seed the database with users, stores, and reviews from YAML.
//!
//! ```yaml
//! users:
//!   - name: Wes
//!     email: wes@example.com
//!     password: correct horse
//! stores:
//!   - name: Omar's Falafel
//!     description: Best falafel in the city
//!     tags: [Vegetarian, Open Late]
//!     address: 1 King St W, Toronto
//!     lng: -79.38
//!     lat: 43.65
//!     author: wes@example.com
//!     reviews:
//!       - author: wes@example.com
//!         rating: 5
//!         text: Crispy!
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use delicious_core::{Email, GeoPoint, Rating, UserId};
use delicious_web::{
    db::{self, RepositoryError, ReviewRepository, StoreRepository, UserRepository},
    models::{Location, NewReview, StoreFields},
    services::auth::{AuthError, MIN_PASSWORD_LENGTH, hash_password},
};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// The seed file could not be read.
    #[error("Could not read {0}: {1}")]
    Read(String, std::io::Error),

    /// The seed file is not valid YAML for this format.
    #[error("Invalid seed file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The seed file failed validation.
    #[error("{0} validation errors found")]
    Invalid(usize),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A repository operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Password hashing failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Top level of the seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub stores: Vec<SeedStore>,
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedStore {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub address: String,
    pub lng: f64,
    pub lat: f64,
    pub photo: Option<String>,
    /// Email of one of the seeded users.
    pub author: String,
    #[serde(default)]
    pub reviews: Vec<SeedReview>,
}

#[derive(Debug, Deserialize)]
pub struct SeedReview {
    /// Email of one of the seeded users.
    pub author: String,
    pub rating: i64,
    pub text: String,
}

/// Check a seed file without touching the database.
///
/// Returns one message per problem.
pub fn validate(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();
    let mut known = Vec::new();

    for user in &seed.users {
        match Email::parse(&user.email) {
            Ok(email) => known.push(email),
            Err(e) => errors.push(format!("user {}: {e}", user.email)),
        }
        if user.name.trim().is_empty() {
            errors.push(format!("user {}: name is blank", user.email));
        }
        if user.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.push(format!(
                "user {}: password shorter than {MIN_PASSWORD_LENGTH} characters",
                user.email
            ));
        }
    }

    let is_known = |email: &str| Email::parse(email).is_ok_and(|e| known.contains(&e));

    for store in &seed.stores {
        if store.name.trim().is_empty() {
            errors.push("store with a blank name".to_string());
        }
        if let Err(e) = GeoPoint::new(store.lng, store.lat) {
            errors.push(format!("store {}: {e}", store.name));
        }
        if !is_known(&store.author) {
            errors.push(format!("store {}: unknown author {}", store.name, store.author));
        }
        for review in &store.reviews {
            if let Err(e) = Rating::new(review.rating) {
                errors.push(format!("store {}: {e}", store.name));
            }
            if !is_known(&review.author) {
                errors.push(format!(
                    "store {}: unknown review author {}",
                    store.name, review.author
                ));
            }
        }
    }

    errors
}

/// Seed from a YAML file.
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, or if any database
/// operation fails.
pub async fn stores(file_path: &str, clear_existing: bool) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading seed data from file");

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SeedError::Read(file_path.to_string(), e))?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(SeedError::Invalid(errors.len()));
    }

    let database_url =
        super::database_url().ok_or(SeedError::MissingEnvVar("DELICIOUS_DATABASE_URL"))?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let stores = StoreRepository::new(&pool);
    if clear_existing {
        let removed = stores.delete_all().await?;
        info!(removed, "Cleared existing stores");
    }

    let users = UserRepository::new(&pool);
    let mut ids: HashMap<Email, UserId> = HashMap::new();
    for user in &seed.users {
        let email = Email::parse(&user.email).map_err(AuthError::from)?;
        let hash = hash_password(&user.password)?;
        let saved = users.upsert(user.name.trim(), &email, &hash).await?;
        ids.insert(email, saved.id);
    }

    let author_id = |email: &str| {
        Email::parse(email)
            .ok()
            .and_then(|e| ids.get(&e).copied())
            .ok_or(RepositoryError::NotFound)
    };

    let reviews = ReviewRepository::new(&pool);
    let mut review_count = 0usize;
    for seed_store in &seed.stores {
        let point = GeoPoint::new(seed_store.lng, seed_store.lat)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        let fields = StoreFields {
            name: seed_store.name.clone(),
            description: seed_store.description.clone(),
            tags: seed_store.tags.clone(),
            location: Location {
                point,
                address: seed_store.address.clone(),
            },
            photo: seed_store.photo.clone(),
        }
        .normalized();

        let store = stores.create(author_id(&seed_store.author)?, &fields).await?;
        info!(slug = %store.slug, "Seeded store");

        for review in &seed_store.reviews {
            let rating = Rating::new(review.rating)
                .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
            reviews
                .create(&NewReview {
                    store: store.id,
                    author: author_id(&review.author)?,
                    text: review.text.clone(),
                    rating,
                })
                .await?;
            review_count += 1;
        }
    }

    info!("Seeding complete!");
    info!("  Users: {}", seed.users.len());
    info!("  Stores: {}", seed.stores.len());
    info!("  Reviews: {review_count}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SEED: &str = r"
users:
  - name: Wes
    email: Wes@Example.com
    password: correct horse
stores:
  - name: Omar's Falafel
    tags: [Vegetarian]
    address: 1 King St W
    lng: -79.38
    lat: 43.65
    author: wes@example.com
    reviews:
      - author: wes@example.com
        rating: 5
        text: Crispy!
";

    #[test]
    fn test_valid_seed_file() {
        let seed: SeedFile = serde_yaml::from_str(SEED).unwrap();
        assert_eq!(seed.stores.len(), 1);
        assert!(seed.stores[0].description.is_empty());
        assert!(validate(&seed).is_empty());
    }

    #[test]
    fn test_validation_reports_every_problem() {
        let seed: SeedFile = serde_yaml::from_str(
            r"
users:
  - name: ' '
    email: not-an-email
    password: short
stores:
  - name: Nowhere
    address: Off the map
    lng: 200
    lat: 0
    author: ghost@example.com
    reviews:
      - author: wes@example.com
        rating: 9
        text: Meh
",
        )
        .unwrap();

        let errors = validate(&seed);
        assert_eq!(errors.len(), 7, "{errors:#?}");
        assert!(errors.iter().any(|e| e.contains("unknown author ghost@example.com")));
    }
}
