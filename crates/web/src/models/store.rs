//! Store domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use delicious_core::{GeoPoint, Slug, StoreId, UserId};

use super::Review;

/// Stores shown per listing page.
pub const STORES_PER_PAGE: u32 = 6;

/// Tags offered on the store editor.
pub const TAG_CHOICES: &[&str] = &["Wifi", "Open Late", "Family Friendly", "Vegetarian", "Licensed"];

/// Whether a store read should also load the store's reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewInclusion {
    /// Load reviews (with their authors), newest first.
    Include,
    /// Leave [`Store::reviews`] as `None`.
    Exclude,
}

/// Where a store is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    /// Serialized inline as GeoJSON `type` and `coordinates`.
    #[serde(flatten)]
    pub point: GeoPoint,
    pub address: String,
}

/// A store listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub tags: Vec<String>,
    pub created: DateTime<Utc>,
    pub location: Location,
    /// File name of the uploaded photo, relative to `/uploads`.
    pub photo: Option<String>,
    pub author: UserId,
    /// Present only when the read asked for [`ReviewInclusion::Include`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<Review>>,
}

impl Store {
    /// Whether `user` may edit this store.
    #[must_use]
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.author == *user
    }

    /// Reviews loaded with the store, or an empty slice.
    #[must_use]
    pub fn reviews(&self) -> &[Review] {
        self.reviews.as_deref().unwrap_or_default()
    }
}

/// Editable store fields, shared by create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreFields {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub location: Location,
    /// New photo; on update `None` keeps the current one.
    pub photo: Option<String>,
}

impl StoreFields {
    /// Trim text fields and drop blank or repeated tags.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.description = self.description.trim().to_string();
        self.location.address = self.location.address.trim().to_string();

        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for tag in self.tags {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }
        self.tags = tags;
        self
    }
}

/// How many stores carry a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: i64,
}

/// A row of the top-stores ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopStore {
    pub id: StoreId,
    pub name: String,
    pub slug: Slug,
    pub photo: Option<String>,
    pub review_count: i64,
    pub average_rating: f64,
}

/// Page arithmetic for the store listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Requested page, 1-based.
    pub page: u32,
    /// Number of pages needed for `count` stores.
    pub pages: u32,
    /// Total stores.
    pub count: i64,
}

impl Pagination {
    /// Paginate `count` stores at [`STORES_PER_PAGE`] per page.
    ///
    /// Page 0 is treated as page 1.
    #[must_use]
    pub fn new(page: u32, count: i64) -> Self {
        let count = count.max(0);
        let per_page = i64::from(STORES_PER_PAGE);
        let pages = u32::try_from((count + per_page - 1) / per_page).unwrap_or(u32::MAX);
        Self {
            page: page.max(1),
            pages,
            count,
        }
    }

    /// Rows to skip before this page.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(STORES_PER_PAGE)
    }

    /// Rows per page.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(STORES_PER_PAGE)
    }

    /// `Some(last_page)` when the requested page lies past the end of a
    /// non-empty listing.
    #[must_use]
    pub const fn overflow_redirect(&self) -> Option<u32> {
        if self.pages > 0 && self.page > self.pages {
            Some(self.pages)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.pages
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fields(tags: &[&str]) -> StoreFields {
        StoreFields {
            name: "  Omar's  ".to_string(),
            description: " Falafel ".to_string(),
            tags: tags.iter().map(ToString::to_string).collect(),
            location: Location {
                point: GeoPoint::new(-79.38, 43.65).unwrap(),
                address: " 1 King St ".to_string(),
            },
            photo: None,
        }
    }

    #[test]
    fn test_normalized_trims_and_dedups() {
        let f = fields(&["Wifi", " ", "Wifi", "Open Late "]).normalized();
        assert_eq!(f.name, "Omar's");
        assert_eq!(f.description, "Falafel");
        assert_eq!(f.location.address, "1 King St");
        assert_eq!(f.tags, ["Wifi", "Open Late"]);
    }

    #[test]
    fn test_pagination_pages() {
        assert_eq!(Pagination::new(1, 0).pages, 0);
        assert_eq!(Pagination::new(1, 6).pages, 1);
        assert_eq!(Pagination::new(1, 7).pages, 2);
        assert_eq!(Pagination::new(3, 13).offset(), 12);
    }

    #[test]
    fn test_pagination_overflow() {
        assert_eq!(Pagination::new(5, 13).overflow_redirect(), Some(3));
        assert_eq!(Pagination::new(3, 13).overflow_redirect(), None);
        // An empty listing renders page 1 instead of redirecting forever.
        assert_eq!(Pagination::new(4, 0).overflow_redirect(), None);
    }

    #[test]
    fn test_pagination_zero_page() {
        let p = Pagination::new(0, 10);
        assert_eq!(p.page, 1);
        assert_eq!(p.offset(), 0);
        assert!(!p.has_previous());
        assert!(p.has_next());
    }

    #[test]
    fn test_store_json_location() {
        let store = Store {
            id: StoreId::new(1),
            name: "Omar".to_string(),
            slug: Slug::from_name("Omar"),
            description: String::new(),
            tags: vec![],
            created: Utc::now(),
            location: fields(&[]).location,
            photo: None,
            author: UserId::new(2),
            reviews: None,
        };
        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(json["location"]["type"], "Point");
        assert_eq!(json["location"]["coordinates"][1], 43.65);
        assert_eq!(json["slug"], "omar");
        assert!(json.get("reviews").is_none());
        assert!(store.is_owned_by(&UserId::new(2)));
        assert!(store.reviews().is_empty());
    }
}
