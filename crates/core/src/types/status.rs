//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// Invoice payment status.
///
/// Invoices are recorded at the point of sale and therefore default to
/// `Paid`; the other states exist for manually adjusted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "sqlite", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlite", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    #[default]
    Paid,
    Pending,
    Void,
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paid => write!(f, "PAID"),
            Self::Pending => write!(f, "PENDING"),
            Self::Void => write!(f, "VOID"),
        }
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAID" => Ok(Self::Paid),
            "PENDING" => Ok(Self::Pending),
            "VOID" => Ok(Self::Void),
            _ => Err(format!("invalid invoice status: {s}")),
        }
    }
}
