//! Client domain type.

use chrono::{DateTime, Utc};

use stockbook_core::{ClientId, Email};

/// A billing client.
#[derive(Debug, Clone)]
pub struct Client {
    /// Unique client ID.
    pub id: ClientId,
    /// First name.
    pub name: String,
    /// Surname.
    pub surname: String,
    /// Email address, unique case-insensitively.
    pub email: Email,
    /// Contact phone number.
    pub phone: Option<String>,
    /// Postal address.
    pub address: Option<String>,
    /// When the client was registered.
    pub registered_at: DateTime<Utc>,
}

impl Client {
    /// Full display name ("name surname").
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surname)
    }
}
