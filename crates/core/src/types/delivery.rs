//! Delivery recipient and address.

use serde::{Deserialize, Serialize};

use super::id::{AddressId, PhoneNumber};

/// The person an order is delivered to.
///
/// Stored in the `users` table keyed by phone number. Re-ingesting an order
/// for a known phone number overwrites the name, email and address link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    /// Recipient full name.
    pub name: String,
    /// Phone number, the natural key of the recipient.
    pub phone: PhoneNumber,
    /// Postal address, flattened into the delivery object on the wire.
    #[serde(flatten)]
    pub address: Address,
    /// Recipient email.
    pub email: String,
    /// Row id of the stored address.
    ///
    /// Absent on ingestion, populated once the address has been written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_id: Option<AddressId>,
}

/// A postal address.
///
/// Every ingestion stores a fresh row; identical addresses are not merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "zip")]
    pub zipcode: String,
    pub city: String,
    #[serde(rename = "address")]
    pub street: String,
    pub region: String,
}
