//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::config::ServerConfig;
use crate::db::RepositoryError;
use crate::inventory::Inventory;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to shared
/// resources: configuration, the database pool, and the inventory cache.
///
/// The cache sits behind a `RwLock` so that reads (listing, searching) run
/// concurrently while every mutation is serialized through a single writer;
/// write-handlers hold the lock across the store-commit-then-cache-mutate
/// sequence.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: SqlitePool,
    inventory: RwLock<Inventory>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Loads the inventory cache from the store; this is the one read that
    /// is fatal when the store is unreachable (the caller `expect`s it).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the initial cache load fails.
    pub async fn new(config: ServerConfig, pool: SqlitePool) -> Result<Self, RepositoryError> {
        let inventory = Inventory::load(&pool).await?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                inventory: RwLock::new(inventory),
            }),
        })
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    /// Get a reference to the lock guarding the inventory cache.
    #[must_use]
    pub fn inventory(&self) -> &RwLock<Inventory> {
        &self.inner.inventory
    }
}
