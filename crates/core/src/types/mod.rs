//! Record schema for Orderly.
//!
//! These types mirror the JSON documents exchanged on the bus and served by
//! lookups, and map one-to-one onto the relational tables.

pub mod delivery;
pub mod id;
pub mod item;
pub mod order;
pub mod payment;

pub use delivery::{Address, Delivery};
pub use id::*;
pub use item::Item;
pub use order::Order;
pub use payment::Payment;
