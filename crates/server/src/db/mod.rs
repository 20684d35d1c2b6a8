//! Database operations for the `SQLite` store.
//!
//! ## Tables
//!
//! - `product` - Inventory items (name unique, case-insensitive)
//! - `client` - Billing clients (email unique, case-insensitive)
//! - `invoice` / `invoice_line` - Invoice headers and their lines
//! - `user` - Login accounts (email unique, stored lowercased)
//!
//! All queries use sqlx's runtime-checked API; monetary columns are integer
//! cents decoded into [`stockbook_core::Money`].
//!
//! # Migrations
//!
//! Migrations are embedded from `crates/server/migrations/` and applied at
//! startup via [`run_migrations`].

pub mod clients;
pub mod invoices;
pub mod products;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;

pub use clients::ClientRepository;
pub use invoices::InvoiceRepository;
pub use products::ProductRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique name or email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `SQLite` connection pool with sensible defaults.
///
/// The database file is created if it does not exist; foreign keys are
/// enforced on every connection.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url.expose_secret())?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

/// Apply the embedded migrations.
///
/// # Errors
///
/// Returns `sqlx::migrate::MigrateError` if a migration fails.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!().run(pool).await
}

/// Map a unique-constraint violation to [`RepositoryError::Conflict`].
///
/// Any other database error passes through unchanged.
pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

/// Map a foreign-key violation to [`RepositoryError::Conflict`].
///
/// Used on deletes: a row referenced by invoice lines or headers cannot be
/// removed, and that is a validation failure rather than a server error.
pub(crate) fn conflict_on_reference(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::str::FromStr;

    use super::SqlitePool;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    /// An in-memory database with migrations applied.
    ///
    /// A single connection keeps every query on the same `:memory:` database;
    /// foreign keys are enforced, as in [`super::create_pool`].
    pub(crate) async fn test_pool() -> SqlitePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .expect("parse sqlite url")
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("connect to in-memory sqlite");

        super::run_migrations(&pool)
            .await
            .expect("apply migrations");

        pool
    }
}
