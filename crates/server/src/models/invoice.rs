//! Invoice domain types.

use chrono::{DateTime, Utc};

use stockbook_core::{ClientId, InvoiceId, InvoiceStatus, Money, ProductId};

/// An invoice header.
///
/// `total = subtotal + tax`, where tax is a fixed 12% of the subtotal.
#[derive(Debug, Clone)]
pub struct Invoice {
    /// Unique invoice ID.
    pub id: InvoiceId,
    /// Client the invoice was issued to.
    pub client_id: ClientId,
    /// When the invoice was issued.
    pub issued_at: DateTime<Utc>,
    /// Sum of line subtotals.
    pub subtotal: Money,
    /// 12% of the subtotal.
    pub tax: Money,
    /// Subtotal plus tax.
    pub total: Money,
    /// Payment status.
    pub status: InvoiceStatus,
}

/// A single invoice line.
///
/// `unit_price` is the price snapshot taken at invoice time; later product
/// price changes do not affect it. `line_subtotal = quantity x unit_price`.
#[derive(Debug, Clone)]
pub struct InvoiceLine {
    /// Invoice this line belongs to.
    pub invoice_id: InvoiceId,
    /// Product ordered.
    pub product_id: ProductId,
    /// Product name at render time (joined for display).
    pub product_name: String,
    /// Units ordered.
    pub quantity: i64,
    /// Unit price snapshot.
    pub unit_price: Money,
    /// Quantity times unit price snapshot.
    pub line_subtotal: Money,
}

/// An invoice joined with its client, for listings and detail pages.
#[derive(Debug, Clone)]
pub struct InvoiceSummary {
    /// The invoice header.
    pub invoice: Invoice,
    /// Client first name.
    pub client_name: String,
    /// Client surname.
    pub client_surname: String,
}
