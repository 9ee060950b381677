//! Payment information attached to an order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::TransactionId;

/// A payment, keyed by its transaction id.
///
/// Transaction ids are unique across the store: ingesting a second order
/// that carries an already-stored transaction is rejected.
///
/// Monetary amounts are decimals, carried as JSON numbers on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment transaction id.
    pub transaction: TransactionId,
    /// Upstream request id, may be empty.
    #[serde(default)]
    pub request_id: String,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Payment provider name.
    pub provider: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// Time of payment, unix seconds on the wire.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub payment_dt: DateTime<Utc>,
    pub bank: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub delivery_cost: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub goods_total: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub custom_fee: Decimal,
}
