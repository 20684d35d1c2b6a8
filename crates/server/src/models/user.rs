//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};

use stockbook_core::{Email, UserId};

/// A login account (domain type).
///
/// The email is stored trimmed and lowercased, so the store's unique index
/// enforces case-insensitive uniqueness.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}
