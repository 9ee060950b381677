//! Relational store for orders.
//!
//! # Tables
//!
//! - `orders` - One row per ingested order, referencing its user and payment
//! - `users` - Delivery recipients keyed by phone number (upserted)
//! - `addresses` - Postal addresses, one fresh row per ingestion
//! - `payments` - Payments keyed by transaction id (unique)
//! - `items` - Order line items
//! - `history` - Last lookup time per order, ranks the cache warm-set
//!
//! The DDL lives in `crates/server/sql/schema.sql` and is applied with
//! `orderly-cli init-db`.
//!
//! # Transactions
//!
//! Every multi-table operation runs inside its own [`StoreTransaction`],
//! obtained from [`PgStore::begin`] and threaded through the individual
//! steps. A failing step rolls the whole unit back; a failing rollback is
//! reported together with the original cause. Opening, the work itself,
//! commit and rollback are each bounded by the store timeout.

pub mod history;
pub mod items;
pub mod orders;
pub mod payments;
pub mod users;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use orderly_core::{Address, AddressId, Delivery, Item, Order, OrderUid, Payment, TransactionId};

/// The relational schema, applied verbatim by [`apply_schema`].
pub const SCHEMA: &str = include_str!("../../sql/schema.sql");

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Input could not be decoded into an order.
    #[error("malformed order: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Unique constraint violation (e.g., duplicate payment transaction).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A row required to assemble the result does not exist.
    #[error("{entity} {key} not found")]
    NotFound {
        /// Kind of row that was looked up.
        entity: &'static str,
        /// Key it was looked up by.
        key: String,
    },

    /// Database error from sqlx (connection, I/O, protocol).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The operation did not finish within the store timeout.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    /// The operation failed and rolling back its transaction failed too.
    #[error("{cause}; rollback failed: {rollback}")]
    RollbackFailed {
        /// The error that triggered the rollback.
        #[source]
        cause: Box<StoreError>,
        /// The error returned by the rollback itself.
        rollback: Box<StoreError>,
    },
}

/// Classification of a [`StoreError`], independent of any transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    Malformed,
    Conflict,
    NotFound,
    Transient,
    Timeout,
}

impl StoreError {
    /// The kind of failure, looking through rollback wrappers.
    #[must_use]
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            Self::Malformed(_) => StoreErrorKind::Malformed,
            Self::Conflict(_) => StoreErrorKind::Conflict,
            Self::NotFound { .. } => StoreErrorKind::NotFound,
            Self::Database(_) => StoreErrorKind::Transient,
            Self::Timeout(_) => StoreErrorKind::Timeout,
            Self::RollbackFailed { cause, .. } => cause.kind(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Map an insert error, turning unique violations into `Conflict`.
    pub(crate) fn from_insert(err: sqlx::Error, what: impl FnOnce() -> String) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{} already exists", what()));
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Create every table of the schema that does not exist yet.
///
/// # Errors
///
/// Returns `sqlx::Error` if any statement fails.
pub async fn apply_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

// =============================================================================
// PgStore
// =============================================================================

/// Handle to the order store.
///
/// Cheap to clone; holds no per-operation state. Every operation that touches
/// more than one row opens its own transaction.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    /// Create a store over `pool`, bounding each operation by `timeout`.
    #[must_use]
    pub const fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Start a new transaction.
    ///
    /// Each call returns an independent handle; concurrent callers never
    /// share one.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if a connection cannot be acquired, or
    /// `StoreError::Timeout` if opening takes longer than the store timeout.
    pub async fn begin(&self) -> Result<StoreTransaction, StoreError> {
        let tx = self
            .bounded(async { self.pool.begin().await.map_err(StoreError::from) })
            .await?;
        Ok(StoreTransaction {
            tx,
            timeout: self.timeout,
        })
    }

    /// Decode a raw order message and store it.
    ///
    /// Nothing touches the database when the message is malformed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Malformed` for undecodable input, otherwise any
    /// error of [`PgStore::save_order`].
    pub async fn add_data(&self, raw: &[u8]) -> Result<OrderUid, StoreError> {
        let order = Order::from_slice(raw)?;
        self.save_order(&order).await?;
        Ok(order.order_uid)
    }

    /// Store an order across all its tables in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the payment transaction or order uid
    /// already exists, `StoreError::Timeout` if the store timeout elapses, or
    /// `StoreError::Database` for other failures. The transaction is rolled
    /// back in every error case.
    #[instrument(skip(self, order), fields(order_uid = %order.order_uid))]
    pub async fn save_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        let result = self.bounded(tx.write_order(order)).await;
        tx.finish(result).await?;

        debug!("Order stored");
        Ok(())
    }

    /// Load an order with its recipient, address, payment and items.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the order or any row it references
    /// is missing. No partial order is ever returned.
    #[instrument(skip(self, id), fields(order_uid = %id))]
    pub async fn get_data_by_id(&self, id: &OrderUid) -> Result<Order, StoreError> {
        let mut tx = self.begin().await?;
        let result = self.bounded(tx.read_order(id)).await;
        tx.finish(result).await
    }

    /// Delete an order with its items, payment and history row.
    ///
    /// The recipient and address rows are kept.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the order does not exist.
    #[instrument(skip(self, id), fields(order_uid = %id))]
    pub async fn delete_data(&self, id: &OrderUid) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        let result = self.bounded(tx.remove_order(id)).await;
        tx.finish(result).await?;

        debug!("Order deleted");
        Ok(())
    }

    /// Order uids of the `limit` most recently looked up orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn get_history_interval(&self, limit: usize) -> Result<Vec<OrderUid>, StoreError> {
        self.bounded(history::recent(&self.pool, limit)).await
    }

    /// Record that `id` was looked up at `at`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the upsert fails.
    pub async fn add_order_history(
        &self,
        id: &OrderUid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.bounded(history::upsert(&self.pool, id, at)).await
    }

    /// Run `operation`, failing with `StoreError::Timeout` once the store
    /// timeout elapses.
    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, operation)
            .await
            .unwrap_or(Err(StoreError::Timeout(self.timeout)))
    }
}

// =============================================================================
// StoreTransaction
// =============================================================================

/// An open store transaction.
///
/// Owned by exactly one logical operation. Dropping it without calling
/// [`commit`](Self::commit) or [`rollback`](Self::rollback) rolls back.
pub struct StoreTransaction {
    tx: Transaction<'static, Postgres>,
    timeout: Duration,
}

impl StoreTransaction {
    /// Insert an address and return its generated id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the insert fails.
    pub async fn add_address(&mut self, address: &Address) -> Result<AddressId, StoreError> {
        users::insert_address(&mut self.tx, address).await
    }

    /// Insert or update the recipient keyed by phone number.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the upsert fails.
    pub async fn add_user(
        &mut self,
        delivery: &Delivery,
        address_id: AddressId,
    ) -> Result<(), StoreError> {
        users::upsert_user(&mut self.tx, delivery, address_id).await
    }

    /// Insert a payment.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the transaction id already exists.
    pub async fn add_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        payments::insert_payment(&mut self.tx, payment).await
    }

    /// Insert the order row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the order uid already exists.
    pub async fn add_order(&mut self, order: &Order) -> Result<(), StoreError> {
        orders::insert_order(&mut self.tx, order).await
    }

    /// Insert items one by one, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the error of the first item that could not be inserted.
    pub async fn add_items(&mut self, order_uid: &OrderUid, items: &[Item]) -> Result<(), StoreError> {
        items::insert_items(&mut self.tx, order_uid, items).await
    }

    /// Write every row of `order`, in dependency order.
    async fn write_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let address_id = self.add_address(&order.delivery.address).await?;
        self.add_user(&order.delivery, address_id).await?;
        if let Some(payment) = &order.payment {
            self.add_payment(payment).await?;
        }
        self.add_order(order).await?;
        self.add_items(&order.order_uid, &order.items).await
    }

    /// Read and assemble the order `id`.
    async fn read_order(&mut self, id: &OrderUid) -> Result<Order, StoreError> {
        let row = orders::get_order(&mut self.tx, id).await?;
        let user = users::get_user(&mut self.tx, &row.delivery_user).await?;
        let items = items::get_items(&mut self.tx, &row.order_id).await?;
        let payment = match &row.transaction_id {
            Some(transaction) => Some(payments::get_payment(&mut self.tx, transaction).await?),
            None => None,
        };
        let address = users::get_address(&mut self.tx, user.address_id).await?;

        let delivery = user.into_delivery(address);
        Ok(row.into_order(delivery, payment, items))
    }

    /// Delete the order `id` and everything it exclusively owns.
    async fn remove_order(&mut self, id: &OrderUid) -> Result<(), StoreError> {
        let transaction: Option<TransactionId> = orders::get_order(&mut self.tx, id)
            .await?
            .transaction_id;

        items::delete_items(&mut self.tx, id).await?;
        orders::delete_order(&mut self.tx, id).await?;
        if let Some(transaction) = transaction {
            payments::delete_payment(&mut self.tx, &transaction).await?;
        }
        history::delete(&mut *self.tx, id).await
    }

    /// Commit the transaction.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the commit fails, or
    /// `StoreError::Timeout` if it does not finish within the store timeout.
    pub async fn commit(self) -> Result<(), StoreError> {
        let timeout = self.timeout;
        match tokio::time::timeout(timeout, self.tx.commit()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout(timeout)),
        }
    }

    /// Roll the transaction back because of `cause`, returning the error to
    /// report.
    ///
    /// The result is `cause` itself, or `StoreError::RollbackFailed` carrying
    /// both errors if the rollback fails or times out as well.
    pub async fn rollback(self, cause: StoreError) -> StoreError {
        let timeout = self.timeout;
        let rollback = match tokio::time::timeout(timeout, self.tx.rollback()).await {
            Ok(Ok(())) => {
                debug!(error = %cause, "Transaction rolled back");
                return cause;
            }
            Ok(Err(err)) => StoreError::Database(err),
            Err(_) => StoreError::Timeout(timeout),
        };

        warn!(error = %cause, rollback_error = %rollback, "Rollback failed");
        StoreError::RollbackFailed {
            cause: Box::new(cause),
            rollback: Box::new(rollback),
        }
    }

    /// Commit on success, roll back on failure.
    ///
    /// # Errors
    ///
    /// Returns the error in `result` (joined with any rollback failure), or
    /// the commit error.
    pub async fn finish<T>(self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(cause) => Err(self.rollback(cause).await),
        }
    }
}
