//! Sample orders for tests.
//!
//! Enabled for this crate's own tests and for dependents through the
//! `fixtures` feature.

use crate::types::{Order, OrderUid, TransactionId};

/// A complete order document as it arrives from the bus.
pub const SAMPLE_ORDER_JSON: &str = r#"{
  "order_uid": "b563feb7b2b84b6test",
  "track_number": "WBILMTESTTRACK",
  "entry": "WBIL",
  "delivery": {
    "name": "Test Testov",
    "phone": "+9720000000",
    "zip": "2639809",
    "city": "Kiryat Mozkin",
    "address": "Ploshad Mira 15",
    "region": "Kraiot",
    "email": "test@gmail.com"
  },
  "payment": {
    "transaction": "b563feb7b2b84b6test",
    "request_id": "",
    "currency": "USD",
    "provider": "wbpay",
    "amount": 1817,
    "payment_dt": 1637907727,
    "bank": "alpha",
    "delivery_cost": 1500,
    "goods_total": 317,
    "custom_fee": 0
  },
  "items": [
    {
      "chrt_id": 9934930,
      "track_number": "WBILMTESTTRACK",
      "price": 453,
      "rid": "ab4219087a764ae0btest",
      "name": "Mascaras",
      "sale": 30,
      "size": "0",
      "total_price": 317,
      "nm_id": 2389212,
      "brand": "Vivienne Sabo",
      "status": 202
    }
  ],
  "locale": "en",
  "internal_signature": "",
  "customer_id": "test",
  "delivery_service": "meest",
  "shardkey": "9",
  "sm_id": 99,
  "date_created": "2021-11-26T06:22:19Z",
  "oof_shard": "1"
}"#;

/// The sample order, parsed.
///
/// # Panics
///
/// Never in practice: the sample document is a fixed valid order.
#[must_use]
#[allow(clippy::expect_used)]
pub fn sample_order() -> Order {
    Order::from_slice(SAMPLE_ORDER_JSON.as_bytes()).expect("sample order is valid")
}

/// The sample order with its natural keys replaced.
///
/// Order uid, phone and payment transaction are all derived from `uid`, so
/// distinct `uid`s never collide on any unique column.
#[must_use]
pub fn sample_order_with_uid(uid: &str) -> Order {
    let mut order = sample_order();
    order.order_uid = OrderUid::new(uid);
    order.delivery.phone = format!("+{uid}").into();
    if let Some(payment) = order.payment.as_mut() {
        payment.transaction = TransactionId::new(format!("tx-{uid}"));
    }
    order
}
