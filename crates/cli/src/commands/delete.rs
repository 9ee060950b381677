//! Order removal.
//!
//! Deletes the order row with its items, payment and lookup history in one
//! transaction. The recipient and address rows are left in place.

use std::time::Duration;

use orderly_core::OrderUid;
use orderly_server::db::PgStore;

use super::{DbCommandError, connect};

const STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Delete the order `order_id`.
pub async fn run(order_id: &str) -> Result<(), DbCommandError> {
    let store = PgStore::new(connect().await?, STORE_TIMEOUT);
    let id = OrderUid::new(order_id);

    store.delete_data(&id).await?;

    tracing::info!(order_uid = %id, "Order deleted");
    Ok(())
}
