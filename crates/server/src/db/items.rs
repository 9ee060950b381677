//! Order line item rows.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::{debug, instrument};

use orderly_core::{Item, OrderUid};

use super::StoreError;

/// Internal row type for item queries.
#[derive(sqlx::FromRow)]
struct ItemRow {
    chrt_id: i64,
    track_number: String,
    price: Decimal,
    rid: String,
    name: String,
    sale: i32,
    size: String,
    total_price: Decimal,
    nm_id: i64,
    brand: String,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            chrt_id: row.chrt_id,
            track_number: row.track_number,
            price: row.price,
            rid: row.rid,
            name: row.name,
            sale: row.sale,
            size: row.size,
            total_price: row.total_price,
            nm_id: row.nm_id,
            brand: row.brand,
        }
    }
}

/// Insert the items of `order_uid` one at a time.
///
/// Stops at the first failing item; the remaining items are not attempted.
///
/// # Errors
///
/// Returns the error of the first item that could not be inserted.
#[instrument(skip(conn, items), fields(order_uid = %order_uid, count = items.len()))]
pub async fn insert_items(
    conn: &mut PgConnection,
    order_uid: &OrderUid,
    items: &[Item],
) -> Result<(), StoreError> {
    for item in items {
        insert_item(conn, order_uid, item).await?;
    }

    debug!("Inserted items");
    Ok(())
}

async fn insert_item(
    conn: &mut PgConnection,
    order_uid: &OrderUid,
    item: &Item,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO items
            (chrt_id, track_number, price, rid, name, sale,
             size, total_price, nm_id, brand, order_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ",
    )
    .bind(item.chrt_id)
    .bind(&item.track_number)
    .bind(item.price)
    .bind(&item.rid)
    .bind(&item.name)
    .bind(item.sale)
    .bind(&item.size)
    .bind(item.total_price)
    .bind(item.nm_id)
    .bind(&item.brand)
    .bind(order_uid)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        StoreError::from_insert(e, || format!("item {} of order {order_uid}", item.chrt_id))
    })?;

    Ok(())
}

/// Fetch all items of `order_uid`. An order may have none.
///
/// # Errors
///
/// Returns `StoreError::Database` if the query fails.
pub async fn get_items(conn: &mut PgConnection, order_uid: &OrderUid) -> Result<Vec<Item>, StoreError> {
    let rows = sqlx::query_as::<_, ItemRow>(
        r"
        SELECT chrt_id, track_number, price, rid, name, sale,
               size, total_price, nm_id, brand
        FROM items
        WHERE order_id = $1
        ORDER BY chrt_id
        ",
    )
    .bind(order_uid)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Item::from).collect())
}

/// Delete all items of `order_uid`, returning how many were removed.
///
/// # Errors
///
/// Returns `StoreError::Database` if the delete fails.
pub async fn delete_items(conn: &mut PgConnection, order_uid: &OrderUid) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM items WHERE order_id = $1")
        .bind(order_uid)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}
