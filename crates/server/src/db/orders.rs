//! Order rows.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

use orderly_core::{Delivery, Item, Order, OrderUid, Payment, PhoneNumber, TransactionId};

use super::StoreError;

/// A row of the `orders` table.
///
/// References its recipient and payment by key; [`OrderRow::into_order`]
/// attaches the referenced rows once they have been loaded.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub order_id: OrderUid,
    pub track_number: String,
    pub entry: String,
    pub delivery_user: PhoneNumber,
    pub transaction_id: Option<TransactionId>,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i32,
    pub oof_shard: String,
    pub date_created: DateTime<Utc>,
}

impl OrderRow {
    /// Assemble the full order from this row and its related rows.
    #[must_use]
    pub fn into_order(self, delivery: Delivery, payment: Option<Payment>, items: Vec<Item>) -> Order {
        Order {
            order_uid: self.order_id,
            track_number: self.track_number,
            entry: self.entry,
            delivery,
            payment,
            items,
            locale: self.locale,
            internal_signature: self.internal_signature,
            customer_id: self.customer_id,
            delivery_service: self.delivery_service,
            shardkey: self.shardkey,
            sm_id: self.sm_id,
            date_created: self.date_created,
            oof_shard: self.oof_shard,
        }
    }
}

/// Insert the order row. The payment column is NULL for unpaid orders.
///
/// # Errors
///
/// Returns `StoreError::Conflict` if the order uid already exists.
#[instrument(skip(conn, order), fields(order_uid = %order.order_uid))]
pub async fn insert_order(conn: &mut PgConnection, order: &Order) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO orders
            (order_id, track_number, entry, delivery_user, transaction_id, locale,
             internal_signature, customer_id, delivery_service, shardkey,
             sm_id, oof_shard, date_created)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ",
    )
    .bind(&order.order_uid)
    .bind(&order.track_number)
    .bind(&order.entry)
    .bind(&order.delivery.phone)
    .bind(order.transaction_id())
    .bind(&order.locale)
    .bind(&order.internal_signature)
    .bind(&order.customer_id)
    .bind(&order.delivery_service)
    .bind(&order.shardkey)
    .bind(order.sm_id)
    .bind(&order.oof_shard)
    .bind(order.date_created)
    .execute(&mut *conn)
    .await
    .map_err(|e| StoreError::from_insert(e, || format!("order {}", order.order_uid)))?;

    Ok(())
}

/// Fetch the order row for `id`.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if there is no such order.
pub async fn get_order(conn: &mut PgConnection, id: &OrderUid) -> Result<OrderRow, StoreError> {
    sqlx::query_as::<_, OrderRow>(
        r"
        SELECT order_id, track_number, entry, delivery_user, transaction_id, locale,
               internal_signature, customer_id, delivery_service, shardkey,
               sm_id, oof_shard, date_created
        FROM orders
        WHERE order_id = $1
        ",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| StoreError::not_found("order", id))
}

/// Delete the order row for `id`.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if no row was deleted.
pub async fn delete_order(conn: &mut PgConnection, id: &OrderUid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM orders WHERE order_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("order", id));
    }
    Ok(())
}
