//! Order lookup through the cache.
//!
//! A lookup is served from the [`OrderCache`] when possible and otherwise
//! assembled from the store, serialized once, and cached. Either way the
//! access is recorded in the lookup history, which ranks the orders loaded at
//! the next startup.

use std::future::Future;

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use orderly_core::{Order, OrderUid};

use crate::cache::OrderCache;
use crate::db::{PgStore, StoreError};

/// Read side of the store, as needed by lookups and cache warm-up.
pub trait OrderReader: Clone + Send + Sync + 'static {
    /// Load a full order.
    fn get_data_by_id(
        &self,
        id: &OrderUid,
    ) -> impl Future<Output = Result<Order, StoreError>> + Send;

    /// Record a lookup of `id` at `at`.
    fn add_order_history(
        &self,
        id: &OrderUid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// The `limit` most recently looked up order uids, newest first.
    fn get_history_interval(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<OrderUid>, StoreError>> + Send;
}

impl OrderReader for PgStore {
    fn get_data_by_id(
        &self,
        id: &OrderUid,
    ) -> impl Future<Output = Result<Order, StoreError>> + Send {
        Self::get_data_by_id(self, id)
    }

    fn add_order_history(
        &self,
        id: &OrderUid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        Self::add_order_history(self, id, at)
    }

    fn get_history_interval(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<OrderUid>, StoreError>> + Send {
        Self::get_history_interval(self, limit)
    }
}

/// Errors returned by [`QueryService::get_order`].
#[derive(Debug, Error)]
pub enum QueryError {
    /// The store could not produce the order.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The order could not be serialized.
    #[error("failed to serialize order: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Served from the cache.
    Hit(Bytes),
    /// Loaded from the store and cached.
    Miss(Bytes),
}

impl Lookup {
    #[must_use]
    pub const fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// The pretty-printed order.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Hit(bytes) | Self::Miss(bytes) => bytes,
        }
    }
}

/// Serves order lookups from the cache, falling back to the store.
#[derive(Debug, Clone)]
pub struct QueryService<R> {
    store: R,
    cache: OrderCache,
}

impl<R: OrderReader> QueryService<R> {
    #[must_use]
    pub const fn new(store: R, cache: OrderCache) -> Self {
        Self { store, cache }
    }

    #[must_use]
    pub const fn store(&self) -> &R {
        &self.store
    }

    #[must_use]
    pub const fn cache(&self) -> &OrderCache {
        &self.cache
    }

    /// Look up the pretty-printed order `id`.
    ///
    /// Store failures are returned without touching the cache. Failing to
    /// record the lookup in the history is logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Store` if the order is not cached and cannot be
    /// loaded, or `QueryError::Serialize` if it cannot be serialized.
    #[instrument(skip(self, id), fields(order_uid = %id, cache_hit = tracing::field::Empty))]
    pub async fn get_order(&self, id: &OrderUid) -> Result<Lookup, QueryError> {
        let requested_at = Utc::now();

        if let Some(bytes) = self.cache.get(id).await {
            tracing::Span::current().record("cache_hit", true);
            self.record_history(id, requested_at).await;
            return Ok(Lookup::Hit(bytes));
        }
        tracing::Span::current().record("cache_hit", false);

        let order = self.store.get_data_by_id(id).await?;
        let bytes = Bytes::from(order.to_pretty_json()?);
        self.cache.add(id.clone(), bytes.clone()).await;
        debug!("Order cached");

        self.record_history(id, requested_at).await;
        Ok(Lookup::Miss(bytes))
    }

    async fn record_history(&self, id: &OrderUid, at: DateTime<Utc>) {
        if let Err(e) = self.store.add_order_history(id, at).await {
            warn!(order_uid = %id, error = %e, "Failed to record lookup history");
        }
    }
}

/// In-memory [`OrderReader`] for unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    struct Inner {
        orders: Mutex<HashMap<OrderUid, Order>>,
        history: Mutex<Vec<(OrderUid, DateTime<Utc>)>>,
        history_limits: Mutex<Vec<usize>>,
        fetches: AtomicUsize,
        fail_history_reads: AtomicBool,
        fail_history_writes: AtomicBool,
    }

    /// Counts fetches and records history calls.
    #[derive(Clone, Default)]
    pub struct MemoryStore {
        inner: Arc<Inner>,
    }

    #[allow(clippy::unwrap_used)]
    impl MemoryStore {
        pub fn insert(&self, order: Order) {
            self.inner
                .orders
                .lock()
                .unwrap()
                .insert(order.order_uid.clone(), order);
        }

        /// Replace the history, newest first, with consecutive timestamps.
        pub fn set_history(&self, ids: &[&str]) {
            let now = Utc::now();
            let mut history = self.inner.history.lock().unwrap();
            history.clear();
            for (offset, id) in ids.iter().enumerate() {
                let at = now - chrono::Duration::seconds(i64::try_from(offset).unwrap());
                history.push((OrderUid::new(*id), at));
            }
        }

        pub fn fetches(&self) -> usize {
            self.inner.fetches.load(Ordering::SeqCst)
        }

        pub fn history(&self) -> Vec<(OrderUid, DateTime<Utc>)> {
            self.inner.history.lock().unwrap().clone()
        }

        pub fn history_limits(&self) -> Vec<usize> {
            self.inner.history_limits.lock().unwrap().clone()
        }

        pub fn fail_history_reads(&self) {
            self.inner.fail_history_reads.store(true, Ordering::SeqCst);
        }

        pub fn fail_history_writes(&self) {
            self.inner.fail_history_writes.store(true, Ordering::SeqCst);
        }
    }

    #[allow(clippy::unwrap_used)]
    impl OrderReader for MemoryStore {
        async fn get_data_by_id(&self, id: &OrderUid) -> Result<Order, StoreError> {
            self.inner.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner
                .orders
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::not_found("order", id))
        }

        async fn add_order_history(
            &self,
            id: &OrderUid,
            at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            if self.inner.fail_history_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            let mut history = self.inner.history.lock().unwrap();
            history.retain(|(existing, _)| existing != id);
            history.push((id.clone(), at));
            history.sort_by(|a, b| b.1.cmp(&a.1));
            drop(history);
            Ok(())
        }

        async fn get_history_interval(&self, limit: usize) -> Result<Vec<OrderUid>, StoreError> {
            self.inner.history_limits.lock().unwrap().push(limit);
            if self.inner.fail_history_reads.load(Ordering::SeqCst) {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            let history = self.inner.history.lock().unwrap();
            Ok(history.iter().take(limit).map(|(id, _)| id.clone()).collect())
        }
    }
}
