//! Invoice repository for database operations.
//!
//! Invoice creation lives in [`crate::services::billing`] because it spans
//! several tables in one transaction; this repository covers reads and the
//! transactional delete.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use stockbook_core::{ClientId, InvoiceId, InvoiceStatus, Money, ProductId};

use super::RepositoryError;
use crate::models::{Invoice, InvoiceLine, InvoiceSummary};

/// Internal row type for invoice queries joined with the client.
#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: i64,
    client_id: i64,
    issued_at: DateTime<Utc>,
    subtotal: i64,
    tax: i64,
    total: i64,
    status: InvoiceStatus,
    client_name: String,
    client_surname: String,
}

impl From<InvoiceRow> for InvoiceSummary {
    fn from(row: InvoiceRow) -> Self {
        Self {
            invoice: Invoice {
                id: InvoiceId::new(row.id),
                client_id: ClientId::new(row.client_id),
                issued_at: row.issued_at,
                subtotal: Money::from_cents(row.subtotal),
                tax: Money::from_cents(row.tax),
                total: Money::from_cents(row.total),
                status: row.status,
            },
            client_name: row.client_name,
            client_surname: row.client_surname,
        }
    }
}

/// Internal row type for invoice line queries joined with the product.
#[derive(Debug, sqlx::FromRow)]
struct InvoiceLineRow {
    invoice_id: i64,
    product_id: i64,
    product_name: String,
    quantity: i64,
    unit_price: i64,
    line_subtotal: i64,
}

impl From<InvoiceLineRow> for InvoiceLine {
    fn from(row: InvoiceLineRow) -> Self {
        Self {
            invoice_id: InvoiceId::new(row.invoice_id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: Money::from_cents(row.unit_price),
            line_subtotal: Money::from_cents(row.line_subtotal),
        }
    }
}

/// Repository for invoice database operations.
pub struct InvoiceRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> InvoiceRepository<'a> {
    /// Create a new invoice repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List all invoices with their client names, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<InvoiceSummary>, RepositoryError> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(
            "SELECT i.id, i.client_id, i.issued_at, i.subtotal, i.tax, i.total, i.status, \
                    c.name AS client_name, c.surname AS client_surname \
             FROM invoice i \
             JOIN client c ON i.client_id = c.id \
             ORDER BY i.issued_at DESC, i.id DESC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get an invoice with its client by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(
        &self,
        id: InvoiceId,
    ) -> Result<Option<InvoiceSummary>, RepositoryError> {
        let row: Option<InvoiceRow> = sqlx::query_as(
            "SELECT i.id, i.client_id, i.issued_at, i.subtotal, i.tax, i.total, i.status, \
                    c.name AS client_name, c.surname AS client_surname \
             FROM invoice i \
             JOIN client c ON i.client_id = c.id \
             WHERE i.id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get the lines of an invoice with product names.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines_for(&self, id: InvoiceId) -> Result<Vec<InvoiceLine>, RepositoryError> {
        let rows: Vec<InvoiceLineRow> = sqlx::query_as(
            "SELECT l.invoice_id, l.product_id, p.name AS product_name, \
                    l.quantity, l.unit_price, l.line_subtotal \
             FROM invoice_line l \
             JOIN product p ON l.product_id = p.id \
             WHERE l.invoice_id = ? \
             ORDER BY l.id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Delete an invoice and its lines in one transaction.
    ///
    /// # Returns
    ///
    /// Returns `true` if the invoice was deleted, `false` if it didn't exist.
    /// When the header is absent nothing is deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; the
    /// transaction is rolled back and neither lines nor header are removed.
    pub async fn delete(&self, id: InvoiceId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM invoice_line WHERE invoice_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM invoice WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}
