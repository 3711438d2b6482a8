//! User domain types.

use chrono::{DateTime, Utc};

use delicious_core::{Email, UserId};

/// A registered user.
///
/// The password hash and reset-token fields never leave the repository; the
/// auth service asks for them explicitly when it needs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Normalised email address.
    pub email: Email,
    /// When the user registered.
    pub created_at: DateTime<Utc>,
}
