//! Billing service: transactional invoice creation and deletion.
//!
//! Invoice creation reads current unit prices, snapshots them into lines,
//! accumulates the subtotal, applies the fixed 12% tax, then writes the
//! header, the lines, and the stock decrements - all inside one transaction.
//! Any failure (missing product, insufficient stock, store error) rolls the
//! entire invoice back, leaving stock and tables unchanged.

use sqlx::SqlitePool;
use thiserror::Error;

use stockbook_core::{ClientId, InvoiceId, InvoiceStatus, Money, ProductId};

use crate::db::RepositoryError;

/// Tax rate applied to every invoice, in percent.
pub const TAX_PERCENT: i64 = 12;

/// Errors that can occur while creating or deleting invoices.
#[derive(Debug, Error)]
pub enum BillingError {
    /// The referenced client does not exist.
    #[error("client {0} does not exist")]
    UnknownClient(ClientId),

    /// A line references a product that does not exist.
    #[error("product {0} does not exist")]
    UnknownProduct(ProductId),

    /// A line orders more units than are in stock.
    #[error("insufficient stock for '{name}': {requested} requested, {available} available")]
    InsufficientStock {
        name: String,
        requested: i64,
        available: i64,
    },

    /// The invoice has no lines.
    #[error("an invoice needs at least one line")]
    EmptyInvoice,

    /// A line has a non-positive quantity.
    #[error("line quantities must be positive")]
    InvalidQuantity,

    /// Underlying store error.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for BillingError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// A requested invoice line: which product and how many units.
#[derive(Debug, Clone, Copy)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Invoice totals: subtotal, 12% tax, and their sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

/// A successfully recorded invoice.
#[derive(Debug, Clone)]
pub struct CreatedInvoice {
    pub id: InvoiceId,
    pub totals: Totals,
    /// Stock decrements applied by the transaction, for the cache to mirror.
    pub decrements: Vec<(ProductId, i64)>,
}

/// Compute invoice totals from line subtotals.
///
/// Tax is a fixed 12% of the subtotal, rounded to the nearest cent;
/// total = subtotal + tax.
#[must_use]
pub fn compute_totals(line_subtotals: &[Money]) -> Totals {
    let subtotal: Money = line_subtotals.iter().copied().sum();
    let tax = subtotal.percentage(TAX_PERCENT);
    Totals {
        subtotal,
        tax,
        total: subtotal + tax,
    }
}

/// Internal row read per line inside the creation transaction.
#[derive(Debug, sqlx::FromRow)]
struct PricedProduct {
    name: String,
    quantity: i64,
    unit_price: i64,
}

/// Billing service.
pub struct BillingService<'a> {
    pool: &'a SqlitePool,
}

impl<'a> BillingService<'a> {
    /// Create a new billing service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Record an invoice for a client and decrement stock, atomically.
    ///
    /// # Errors
    ///
    /// Returns a validation error (`UnknownClient`, `UnknownProduct`,
    /// `InsufficientStock`, `EmptyInvoice`, `InvalidQuantity`) or a
    /// repository error; in every error case the transaction is rolled back
    /// and nothing is persisted.
    pub async fn create_invoice(
        &self,
        client_id: ClientId,
        lines: &[LineRequest],
    ) -> Result<CreatedInvoice, BillingError> {
        if lines.is_empty() {
            return Err(BillingError::EmptyInvoice);
        }
        if lines.iter().any(|l| l.quantity <= 0) {
            return Err(BillingError::InvalidQuantity);
        }

        let mut tx = self.pool.begin().await?;

        let client_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM client WHERE id = ?")
            .bind(client_id)
            .fetch_optional(&mut *tx)
            .await?;
        if client_exists.is_none() {
            return Err(BillingError::UnknownClient(client_id));
        }

        // Price each line from the current product row, snapshotting the
        // unit price so later price changes do not affect this invoice.
        let mut line_subtotals = Vec::with_capacity(lines.len());
        let mut priced = Vec::with_capacity(lines.len());
        for line in lines {
            let product: Option<PricedProduct> = sqlx::query_as(
                "SELECT name, quantity, unit_price FROM product WHERE id = ?",
            )
            .bind(line.product_id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(product) = product else {
                return Err(BillingError::UnknownProduct(line.product_id));
            };

            if product.quantity < line.quantity {
                return Err(BillingError::InsufficientStock {
                    name: product.name,
                    requested: line.quantity,
                    available: product.quantity,
                });
            }

            let unit_price = Money::from_cents(product.unit_price);
            let line_subtotal = unit_price.times(line.quantity);
            line_subtotals.push(line_subtotal);
            priced.push((line.product_id, line.quantity, unit_price, line_subtotal));
        }

        let totals = compute_totals(&line_subtotals);

        let invoice_id: i64 = sqlx::query_scalar(
            "INSERT INTO invoice (client_id, subtotal, tax, total, status) \
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(client_id)
        .bind(totals.subtotal)
        .bind(totals.tax)
        .bind(totals.total)
        .bind(InvoiceStatus::Paid)
        .fetch_one(&mut *tx)
        .await?;

        for (product_id, quantity, unit_price, line_subtotal) in &priced {
            sqlx::query(
                "INSERT INTO invoice_line \
                 (invoice_id, product_id, quantity, unit_price, line_subtotal) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(invoice_id)
            .bind(product_id)
            .bind(quantity)
            .bind(unit_price)
            .bind(line_subtotal)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE product SET quantity = quantity - ? WHERE id = ?")
                .bind(quantity)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(CreatedInvoice {
            id: InvoiceId::new(invoice_id),
            totals,
            decrements: priced.iter().map(|(id, qty, _, _)| (*id, *qty)).collect(),
        })
    }
}
