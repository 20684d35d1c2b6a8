//! Domain models.
//!
//! These types represent validated domain objects separate from database
//! row types.

pub mod client;
pub mod invoice;
pub mod product;
pub mod session;
pub mod user;

pub use client::Client;
pub use invoice::{Invoice, InvoiceLine, InvoiceSummary};
pub use product::Product;
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
