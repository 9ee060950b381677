//! Lookup history.
//!
//! One row per order uid holding the time of its latest lookup. The table is
//! advisory: it only ranks which orders are loaded into the cache at startup.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use tracing::{debug, instrument};

use orderly_core::OrderUid;

use super::StoreError;

/// Record a lookup of `order_uid` at `at`.
///
/// An existing record is only moved forward in time, never back.
///
/// # Errors
///
/// Returns `StoreError::Database` if the upsert fails.
#[instrument(skip(executor))]
pub async fn upsert<'e>(
    executor: impl PgExecutor<'e>,
    order_uid: &OrderUid,
    at: DateTime<Utc>,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO history (order_id, triggered_at)
        VALUES ($1, $2)
        ON CONFLICT (order_id) DO UPDATE SET triggered_at = EXCLUDED.triggered_at
        WHERE history.triggered_at < EXCLUDED.triggered_at
        ",
    )
    .bind(order_uid)
    .bind(at)
    .execute(executor)
    .await?;

    Ok(())
}

/// The `limit` most recently looked up order uids, newest first.
///
/// # Errors
///
/// Returns `StoreError::Database` if the query fails.
pub async fn recent<'e>(
    executor: impl PgExecutor<'e>,
    limit: usize,
) -> Result<Vec<OrderUid>, StoreError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let rows: Vec<(OrderUid,)> = sqlx::query_as(
        r"
        SELECT order_id
        FROM history
        ORDER BY triggered_at DESC, order_id
        LIMIT $1
        ",
    )
    .bind(limit)
    .fetch_all(executor)
    .await?;

    debug!(count = rows.len(), "Loaded lookup history");
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Forget the lookup history of `order_uid`.
///
/// # Errors
///
/// Returns `StoreError::Database` if the delete fails.
pub async fn delete<'e>(
    executor: impl PgExecutor<'e>,
    order_uid: &OrderUid,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM history WHERE order_id = $1")
        .bind(order_uid)
        .execute(executor)
        .await?;

    Ok(())
}
