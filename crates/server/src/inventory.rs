//! In-memory write-through inventory cache.
//!
//! Mirrors the `product` and `client` tables: a map keyed by identifier for
//! O(1) lookups, plus a set of normalized unique-field values (product
//! names, client emails) for O(1) duplicate rejection without a query per
//! write.
//!
//! Consistency contract: the store write commits first, and the map/index
//! mutate only on success, so the cache never reflects a failed or
//! uncommitted write. There is no invalidation or expiry; the cache assumes
//! this process is the sole writer, and all access is serialized through the
//! `RwLock` held in [`crate::state::AppState`].

use std::collections::{HashMap, HashSet};

use sqlx::SqlitePool;
use thiserror::Error;

use stockbook_core::{ClientId, Email, Money, ProductId};

use crate::db::{ClientRepository, ProductRepository, RepositoryError};
use crate::models::{Client, Product};

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// A product with the same (case-insensitive) name already exists.
    #[error("a product named '{0}' already exists")]
    DuplicateName(String),

    /// A client with the same (case-insensitive) email already exists.
    #[error("a client with email '{0}' already exists")]
    DuplicateEmail(String),

    /// The record cannot be deleted because invoices still reference it.
    #[error("cannot delete '{0}': invoices still reference it")]
    InUse(String),

    /// Underlying store error.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Normalize a unique-field value for duplicate comparison.
///
/// Shared by the add and update paths so the two can never diverge.
#[must_use]
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Partial product update; `None` fields keep their current value.
#[derive(Debug, Default, Clone)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub quantity: Option<i64>,
    pub unit_price: Option<Money>,
}

/// Partial client update; `None` fields keep their current value.
/// `phone`/`address` are replaced outright since the form always posts them.
#[derive(Debug, Default, Clone)]
pub struct ClientPatch {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub email: Option<Email>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// The in-process mirror of the product and client tables.
pub struct Inventory {
    products: HashMap<ProductId, Product>,
    product_names: HashSet<String>,
    clients: HashMap<ClientId, Client>,
    client_emails: HashSet<String>,
}

impl Inventory {
    /// Load the cache by reading both backing tables in full.
    ///
    /// Called once at process start; the caller treats failure as fatal
    /// (no retry).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store is unreachable.
    pub async fn load(pool: &SqlitePool) -> Result<Self, RepositoryError> {
        let products = ProductRepository::new(pool).list_all().await?;
        let clients = ClientRepository::new(pool).list_all().await?;

        let product_names = products.iter().map(|p| normalize(&p.name)).collect();
        let client_emails = clients.iter().map(|c| c.email.normalized()).collect();

        Ok(Self {
            products: products.into_iter().map(|p| (p.id, p)).collect(),
            product_names,
            clients: clients.into_iter().map(|c| (c.id, c)).collect(),
            client_emails,
        })
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Add a product.
    ///
    /// The name is checked against the duplicate index first; the row is
    /// inserted into the store, and only after the insert succeeds are the
    /// map and index updated. A store-level uniqueness violation (a race
    /// with another writer) surfaces as the same [`InventoryError::DuplicateName`].
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if the normalized name is already used, or a
    /// repository error if the store write fails.
    pub async fn add_product(
        &mut self,
        pool: &SqlitePool,
        name: &str,
        quantity: i64,
        unit_price: Money,
    ) -> Result<Product, InventoryError> {
        let key = normalize(name);
        if self.product_names.contains(&key) {
            return Err(InventoryError::DuplicateName(name.trim().to_owned()));
        }

        let product = ProductRepository::new(pool)
            .insert(name.trim(), quantity, unit_price)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => {
                    InventoryError::DuplicateName(name.trim().to_owned())
                }
                other => InventoryError::Repository(other),
            })?;

        self.products.insert(product.id, product.clone());
        self.product_names.insert(key);
        Ok(product)
    }

    /// Update a product with partial fields.
    ///
    /// A cache miss falls back to a direct store read. When the name
    /// changes, the new value is checked against the index excluding the
    /// record's own current value. The store commits first; then the map is
    /// replaced and the index swaps the old normalized name for the new one.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if the new name collides with another
    /// product, or a repository error if the store write fails.
    pub async fn update_product(
        &mut self,
        pool: &SqlitePool,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Option<Product>, InventoryError> {
        let repo = ProductRepository::new(pool);

        let current = match self.products.get(&id) {
            Some(p) => p.clone(),
            None => match repo.get_by_id(id).await? {
                Some(p) => p,
                None => return Ok(None),
            },
        };

        let old_key = normalize(&current.name);
        let name = patch
            .name
            .map_or_else(|| current.name.clone(), |n| n.trim().to_owned());
        let new_key = normalize(&name);

        if new_key != old_key && self.product_names.contains(&new_key) {
            return Err(InventoryError::DuplicateName(name));
        }

        let quantity = patch.quantity.unwrap_or(current.quantity);
        let unit_price = patch.unit_price.unwrap_or(current.unit_price);

        let updated = match repo.update(id, &name, quantity, unit_price).await {
            Ok(p) => p,
            Err(RepositoryError::NotFound) => return Ok(None),
            Err(RepositoryError::Conflict(_)) => {
                return Err(InventoryError::DuplicateName(name));
            }
            Err(other) => return Err(InventoryError::Repository(other)),
        };

        self.products.insert(id, updated.clone());
        if new_key != old_key {
            self.product_names.remove(&old_key);
            self.product_names.insert(new_key);
        }
        Ok(Some(updated))
    }

    /// Delete a product.
    ///
    /// # Returns
    ///
    /// `Ok(false)` when the identifier is absent - a not-found indication
    /// rather than an error.
    ///
    /// # Errors
    ///
    /// Returns `InUse` if invoice lines still reference the product, or a
    /// repository error if the store delete fails; the cache is left
    /// untouched in either case.
    pub async fn delete_product(
        &mut self,
        pool: &SqlitePool,
        id: ProductId,
    ) -> Result<bool, InventoryError> {
        let repo = ProductRepository::new(pool);

        let record = match self.products.get(&id) {
            Some(p) => p.clone(),
            None => match repo.get_by_id(id).await? {
                Some(p) => p,
                None => return Ok(false),
            },
        };

        let deleted = repo.delete(id).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => InventoryError::InUse(record.name.clone()),
            other => InventoryError::Repository(other),
        })?;
        if deleted {
            self.products.remove(&id);
            self.product_names.remove(&normalize(&record.name));
        }
        Ok(deleted)
    }

    /// Look up a cached product by ID.
    #[must_use]
    pub fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.get(&id)
    }

    /// All cached products, sorted by name.
    #[must_use]
    pub fn list_products(&self) -> Vec<Product> {
        let mut products: Vec<Product> = self.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        products
    }

    /// Case-insensitive substring search over cached product names,
    /// sorted by name.
    #[must_use]
    pub fn search_products(&self, query: &str) -> Vec<Product> {
        let q = query.to_lowercase();
        let mut products: Vec<Product> = self
            .products
            .values()
            .filter(|p| p.name.to_lowercase().contains(&q))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        products
    }

    /// Apply stock decrements after a committed invoice.
    ///
    /// The billing transaction has already decremented the store; this keeps
    /// the cached quantities in line with it.
    pub fn apply_stock_decrements(&mut self, decrements: &[(ProductId, i64)]) {
        for (id, quantity) in decrements {
            if let Some(product) = self.products.get_mut(id) {
                product.quantity -= quantity;
            }
        }
    }

    // =========================================================================
    // Clients
    // =========================================================================

    /// Add a client.
    ///
    /// Same write-through contract as [`Self::add_product`], with the email
    /// as the unique field.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateEmail` if the normalized email is already used, or
    /// a repository error if the store write fails.
    pub async fn add_client(
        &mut self,
        pool: &SqlitePool,
        name: &str,
        surname: &str,
        email: &Email,
        phone: Option<&str>,
        address: Option<&str>,
    ) -> Result<Client, InventoryError> {
        let key = email.normalized();
        if self.client_emails.contains(&key) {
            return Err(InventoryError::DuplicateEmail(email.as_str().to_owned()));
        }

        let client = ClientRepository::new(pool)
            .insert(name.trim(), surname.trim(), email, phone, address)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => {
                    InventoryError::DuplicateEmail(email.as_str().to_owned())
                }
                other => InventoryError::Repository(other),
            })?;

        self.clients.insert(client.id, client.clone());
        self.client_emails.insert(key);
        Ok(client)
    }

    /// Update a client with partial fields.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateEmail` if the new email collides with another
    /// client, or a repository error if the store write fails.
    pub async fn update_client(
        &mut self,
        pool: &SqlitePool,
        id: ClientId,
        patch: ClientPatch,
    ) -> Result<Option<Client>, InventoryError> {
        let repo = ClientRepository::new(pool);

        let current = match self.clients.get(&id) {
            Some(c) => c.clone(),
            None => match repo.get_by_id(id).await? {
                Some(c) => c,
                None => return Ok(None),
            },
        };

        let old_key = current.email.normalized();
        let email = patch.email.unwrap_or_else(|| current.email.clone());
        let new_key = email.normalized();

        if new_key != old_key && self.client_emails.contains(&new_key) {
            return Err(InventoryError::DuplicateEmail(email.as_str().to_owned()));
        }

        let name = patch
            .name
            .map_or_else(|| current.name.clone(), |n| n.trim().to_owned());
        let surname = patch
            .surname
            .map_or_else(|| current.surname.clone(), |s| s.trim().to_owned());
        let phone = patch.phone.filter(|p| !p.trim().is_empty());
        let address = patch.address.filter(|a| !a.trim().is_empty());

        let updated = match repo
            .update(
                id,
                &name,
                &surname,
                &email,
                phone.as_deref().map(str::trim),
                address.as_deref().map(str::trim),
            )
            .await
        {
            Ok(c) => c,
            Err(RepositoryError::NotFound) => return Ok(None),
            Err(RepositoryError::Conflict(_)) => {
                return Err(InventoryError::DuplicateEmail(email.as_str().to_owned()));
            }
            Err(other) => return Err(InventoryError::Repository(other)),
        };

        self.clients.insert(id, updated.clone());
        if new_key != old_key {
            self.client_emails.remove(&old_key);
            self.client_emails.insert(new_key);
        }
        Ok(Some(updated))
    }

    /// Delete a client.
    ///
    /// # Returns
    ///
    /// `Ok(false)` when the identifier is absent.
    ///
    /// # Errors
    ///
    /// Returns `InUse` if invoices still reference the client, or a
    /// repository error if the store delete fails.
    pub async fn delete_client(
        &mut self,
        pool: &SqlitePool,
        id: ClientId,
    ) -> Result<bool, InventoryError> {
        let repo = ClientRepository::new(pool);

        let record = match self.clients.get(&id) {
            Some(c) => c.clone(),
            None => match repo.get_by_id(id).await? {
                Some(c) => c,
                None => return Ok(false),
            },
        };

        let deleted = repo.delete(id).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => InventoryError::InUse(record.full_name()),
            other => InventoryError::Repository(other),
        })?;
        if deleted {
            self.clients.remove(&id);
            self.client_emails.remove(&record.email.normalized());
        }
        Ok(deleted)
    }

    /// Look up a cached client by ID.
    #[must_use]
    pub fn client(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    /// All cached clients, sorted by email.
    #[must_use]
    pub fn list_clients(&self) -> Vec<Client> {
        let mut clients: Vec<Client> = self.clients.values().cloned().collect();
        clients.sort_by(|a, b| a.email.as_str().cmp(b.email.as_str()));
        clients
    }

    /// Case-insensitive substring search over cached client emails,
    /// sorted by email.
    #[must_use]
    pub fn search_clients(&self, query: &str) -> Vec<Client> {
        let q = query.to_lowercase();
        let mut clients: Vec<Client> = self
            .clients
            .values()
            .filter(|c| c.email.normalized().contains(&q))
            .cloned()
            .collect();
        clients.sort_by(|a, b| a.email.as_str().cmp(b.email.as_str()));
        clients
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;

    fn price(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Widget  "), "widget");
        assert_eq!(normalize("WIDGET"), "widget");
        assert_eq!(normalize("widget"), "widget");
    }

    #[tokio::test]
    async fn test_add_product_rejects_case_insensitive_duplicate() {
        let pool = test_pool().await;
        let mut inv = Inventory::load(&pool).await.unwrap();

        inv.add_product(&pool, "Widget", 5, price("10.00"))
            .await
            .unwrap();

        let err = inv
            .add_product(&pool, "  WIDGET ", 1, price("2.00"))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::DuplicateName(_)));

        // Nothing was written for the rejected add
        let stored = crate::db::ProductRepository::new(&pool)
            .list_all()
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_added_product_visible_in_cache_and_store() {
        let pool = test_pool().await;
        let mut inv = Inventory::load(&pool).await.unwrap();

        let product = inv
            .add_product(&pool, "Widget", 5, price("10.00"))
            .await
            .unwrap();

        // Immediately visible in a cache search
        let found = inv.search_products("widg");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, product.id);

        // And in a fresh load from the store
        let fresh = Inventory::load(&pool).await.unwrap();
        assert_eq!(fresh.product(product.id).unwrap().name, "Widget");
    }

    #[tokio::test]
    async fn test_update_rejects_name_taken_by_other_product() {
        let pool = test_pool().await;
        let mut inv = Inventory::load(&pool).await.unwrap();

        inv.add_product(&pool, "Widget", 5, price("10.00"))
            .await
            .unwrap();
        let gadget = inv
            .add_product(&pool, "Gadget", 3, price("7.50"))
            .await
            .unwrap();

        let err = inv
            .update_product(
                &pool,
                gadget.id,
                ProductPatch {
                    name: Some("widget".to_owned()),
                    ..ProductPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::DuplicateName(_)));

        // The original record is unchanged, in cache and store
        assert_eq!(inv.product(gadget.id).unwrap().name, "Gadget");
        let stored = crate::db::ProductRepository::new(&pool)
            .get_by_id(gadget.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, "Gadget");
    }

    #[tokio::test]
    async fn test_update_same_name_different_case_is_allowed() {
        let pool = test_pool().await;
        let mut inv = Inventory::load(&pool).await.unwrap();

        let widget = inv
            .add_product(&pool, "widget", 5, price("10.00"))
            .await
            .unwrap();

        // Renaming a record onto its own name (any casing) is not a duplicate
        let updated = inv
            .update_product(
                &pool,
                widget.id,
                ProductPatch {
                    name: Some("Widget".to_owned()),
                    ..ProductPatch::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Widget");
    }

    #[tokio::test]
    async fn test_update_swaps_index_entry() {
        let pool = test_pool().await;
        let mut inv = Inventory::load(&pool).await.unwrap();

        let widget = inv
            .add_product(&pool, "Widget", 5, price("10.00"))
            .await
            .unwrap();

        inv.update_product(
            &pool,
            widget.id,
            ProductPatch {
                name: Some("Sprocket".to_owned()),
                ..ProductPatch::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

        // The old name is free again, the new one is taken
        inv.add_product(&pool, "Widget", 1, price("1.00"))
            .await
            .unwrap();
        let err = inv
            .add_product(&pool, "sprocket", 1, price("1.00"))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn test_update_missing_product_returns_none() {
        let pool = test_pool().await;
        let mut inv = Inventory::load(&pool).await.unwrap();

        let result = inv
            .update_product(
                &pool,
                ProductId::new(999),
                ProductPatch {
                    quantity: Some(1),
                    ..ProductPatch::default()
                },
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_id_returns_not_found() {
        let pool = test_pool().await;
        let mut inv = Inventory::load(&pool).await.unwrap();

        inv.add_product(&pool, "Widget", 5, price("10.00"))
            .await
            .unwrap();

        let deleted = inv.delete_product(&pool, ProductId::new(999)).await.unwrap();
        assert!(!deleted);

        // No side effects
        assert_eq!(inv.list_products().len(), 1);
        let stored = crate::db::ProductRepository::new(&pool)
            .list_all()
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_from_index() {
        let pool = test_pool().await;
        let mut inv = Inventory::load(&pool).await.unwrap();

        let widget = inv
            .add_product(&pool, "Widget", 5, price("10.00"))
            .await
            .unwrap();
        assert!(inv.delete_product(&pool, widget.id).await.unwrap());

        // The name is available again
        inv.add_product(&pool, "WIDGET", 2, price("4.00"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_search_is_substring_and_sorted() {
        let pool = test_pool().await;
        let mut inv = Inventory::load(&pool).await.unwrap();

        inv.add_product(&pool, "Steel bolt", 5, price("0.50"))
            .await
            .unwrap();
        inv.add_product(&pool, "Brass bolt", 5, price("0.75"))
            .await
            .unwrap();
        inv.add_product(&pool, "Washer", 5, price("0.10"))
            .await
            .unwrap();

        let found = inv.search_products("BOLT");
        let names: Vec<&str> = found.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Brass bolt", "Steel bolt"]);
    }

    #[tokio::test]
    async fn test_client_duplicate_email_rejected() {
        let pool = test_pool().await;
        let mut inv = Inventory::load(&pool).await.unwrap();

        let email = Email::parse("ana@example.com").unwrap();
        inv.add_client(&pool, "Ana", "Lopez", &email, None, None)
            .await
            .unwrap();

        let shouting = Email::parse("ANA@EXAMPLE.COM").unwrap();
        let err = inv
            .add_client(&pool, "Ana Maria", "Lopez", &shouting, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn test_client_email_update_swaps_index() {
        let pool = test_pool().await;
        let mut inv = Inventory::load(&pool).await.unwrap();

        let ana = inv
            .add_client(
                &pool,
                "Ana",
                "Lopez",
                &Email::parse("ana@example.com").unwrap(),
                Some("555-0100"),
                None,
            )
            .await
            .unwrap();

        inv.update_client(
            &pool,
            ana.id,
            ClientPatch {
                email: Some(Email::parse("ana.lopez@example.com").unwrap()),
                ..ClientPatch::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

        // Old address freed, new one taken
        inv.add_client(
            &pool,
            "Ana",
            "Torres",
            &Email::parse("ana@example.com").unwrap(),
            None,
            None,
        )
        .await
        .unwrap();
        let err = inv
            .add_client(
                &pool,
                "Someone",
                "Else",
                &Email::parse("Ana.Lopez@example.com").unwrap(),
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn test_client_search_by_email() {
        let pool = test_pool().await;
        let mut inv = Inventory::load(&pool).await.unwrap();

        inv.add_client(
            &pool,
            "Ana",
            "Lopez",
            &Email::parse("ana@first.com").unwrap(),
            None,
            None,
        )
        .await
        .unwrap();
        inv.add_client(
            &pool,
            "Bruno",
            "Diaz",
            &Email::parse("bruno@second.com").unwrap(),
            None,
            None,
        )
        .await
        .unwrap();

        let found = inv.search_clients("FIRST");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Ana");
    }

    #[tokio::test]
    async fn test_apply_stock_decrements() {
        let pool = test_pool().await;
        let mut inv = Inventory::load(&pool).await.unwrap();

        let widget = inv
            .add_product(&pool, "Widget", 10, price("10.00"))
            .await
            .unwrap();

        inv.apply_stock_decrements(&[(widget.id, 3)]);
        assert_eq!(inv.product(widget.id).unwrap().quantity, 7);
    }
}
