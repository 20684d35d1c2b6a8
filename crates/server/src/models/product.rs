//! Product domain type.

use stockbook_core::{Money, ProductId};

/// An inventory item.
///
/// The name is unique across products under case-insensitive comparison;
/// quantity is the current stock level, decremented by invoicing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// Unique product ID (store-assigned).
    pub id: ProductId,
    /// Display name, unique case-insensitively.
    pub name: String,
    /// Units in stock.
    pub quantity: i64,
    /// Price per unit.
    pub unit_price: Money,
}
