//! Domain models for Delicious.
//!
//! These are the validated shapes handed between repositories, services, and
//! templates. Database row types stay private to the `db` module.

pub mod review;
pub mod session;
pub mod store;
pub mod user;

pub use review::{NewReview, Review, ReviewAuthor};
pub use session::{CurrentUser, keys as session_keys};
pub use store::{
    Location, Pagination, ReviewInclusion, STORES_PER_PAGE, Store, StoreFields, TAG_CHOICES,
    TagCount, TopStore,
};
pub use user::User;
