//! Order line items.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single line item.
///
/// Items have no identity of their own; `chrt_id` is unique within the
/// owning order only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub rid: String,
    pub name: String,
    /// Discount in percent.
    pub sale: i32,
    pub size: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub nm_id: i64,
    pub brand: String,
}
