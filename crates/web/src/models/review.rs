//! Review domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use delicious_core::{Rating, ReviewId, StoreId, UserId};

/// The part of a review's author shown next to the review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewAuthor {
    pub id: UserId,
    pub name: String,
}

/// A review of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub store: StoreId,
    pub author: ReviewAuthor,
    pub text: String,
    pub rating: Rating,
    pub created: DateTime<Utc>,
}

/// Input for creating a review.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub store: StoreId,
    pub author: UserId,
    /// Review body; trimmed before it is stored.
    pub text: String,
    pub rating: Rating,
}
