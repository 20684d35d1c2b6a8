//! Client repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use stockbook_core::{ClientId, Email};

use super::{RepositoryError, conflict_on_reference, conflict_on_unique};
use crate::models::Client;

/// Internal row type for client queries.
#[derive(Debug, sqlx::FromRow)]
struct ClientRow {
    id: i64,
    name: String,
    surname: String,
    email: String,
    phone: Option<String>,
    address: Option<String>,
    registered_at: DateTime<Utc>,
}

impl TryFrom<ClientRow> for Client {
    type Error = RepositoryError;

    fn try_from(row: ClientRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: ClientId::new(row.id),
            name: row.name,
            surname: row.surname,
            email,
            phone: row.phone,
            address: row.address,
            registered_at: row.registered_at,
        })
    }
}

/// Repository for client database operations.
pub struct ClientRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ClientRepository<'a> {
    /// Create a new client repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List all clients, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored email is invalid.
    pub async fn list_all(&self) -> Result<Vec<Client>, RepositoryError> {
        let rows: Vec<ClientRow> = sqlx::query_as(
            "SELECT id, name, surname, email, phone, address, registered_at \
             FROM client ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a client by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_id(&self, id: ClientId) -> Result<Option<Client>, RepositoryError> {
        let row: Option<ClientRow> = sqlx::query_as(
            "SELECT id, name, surname, email, phone, address, registered_at \
             FROM client WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Insert a new client.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn insert(
        &self,
        name: &str,
        surname: &str,
        email: &Email,
        phone: Option<&str>,
        address: Option<&str>,
    ) -> Result<Client, RepositoryError> {
        let row: ClientRow = sqlx::query_as(
            "INSERT INTO client (name, surname, email, phone, address) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING id, name, surname, email, phone, address, registered_at",
        )
        .bind(name)
        .bind(surname)
        .bind(email)
        .bind(phone)
        .bind(address)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "client email already exists"))?;

        row.try_into()
    }

    /// Update a client's fields in place.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the client doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new email is already used.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(
        &self,
        id: ClientId,
        name: &str,
        surname: &str,
        email: &Email,
        phone: Option<&str>,
        address: Option<&str>,
    ) -> Result<Client, RepositoryError> {
        let row: Option<ClientRow> = sqlx::query_as(
            "UPDATE client SET name = ?, surname = ?, email = ?, phone = ?, address = ? \
             WHERE id = ? \
             RETURNING id, name, surname, email, phone, address, registered_at",
        )
        .bind(name)
        .bind(surname)
        .bind(email)
        .bind(phone)
        .bind(address)
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "client email already exists"))?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Delete a client by their ID.
    ///
    /// # Returns
    ///
    /// Returns `true` if the client was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the client still has invoices.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn delete(&self, id: ClientId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM client WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| conflict_on_reference(e, "client still has invoices"))?;

        Ok(result.rows_affected() > 0)
    }
}
