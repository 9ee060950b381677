//! The order aggregate.
//!
//! An [`Order`] is the unit of ingestion and lookup: one bus message carries
//! one order with its delivery recipient, optional payment and items, and one
//! lookup returns the same shape reassembled from the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

use super::delivery::Delivery;
use super::id::{OrderUid, TransactionId};
use super::item::Item;
use super::payment::Payment;

/// A customer order with everything attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    pub order_uid: OrderUid,
    pub track_number: String,
    /// Entry channel the order came through.
    pub entry: String,
    /// Recipient and delivery address.
    pub delivery: Delivery,
    /// Payment, absent for orders that were not paid through a provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
    #[serde(default)]
    pub items: Vec<Item>,
    pub locale: String,
    #[serde(default)]
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i32,
    /// Creation time, truncated to microseconds on decode.
    #[serde(deserialize_with = "microseconds::deserialize")]
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

impl Order {
    /// Parse an order from a raw JSON message.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the bytes are not a valid order document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Serialize the order as pretty-printed JSON.
    ///
    /// This is the representation served by lookups and held in the cache.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_pretty_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = Vec::with_capacity(1024);
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        Ok(buf)
    }

    /// Transaction id of the attached payment, if any.
    #[must_use]
    pub fn transaction_id(&self) -> Option<&TransactionId> {
        self.payment.as_ref().map(|p| &p.transaction)
    }

    /// Copy of the order with store-generated data stripped and items sorted.
    ///
    /// Two orders that differ only in their generated address id or in item
    /// order compare equal after normalization.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut order = self.clone();
        order.delivery.address_id = None;
        order
            .items
            .sort_by(|a, b| (a.chrt_id, &a.rid).cmp(&(b.chrt_id, &b.rid)));
        order
    }
}

/// Timestamps at the precision `PostgreSQL` keeps, so a stored order reads
/// back equal to the one decoded.
mod microseconds {
    use chrono::{DateTime, SubsecRound, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        DateTime::<Utc>::deserialize(deserializer).map(|at| at.trunc_subsecs(6))
    }
}
