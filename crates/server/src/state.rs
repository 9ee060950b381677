//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::OrderCache;
use crate::db::PgStore;
use crate::query::QueryService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and owns the long-lived order
/// cache through its [`QueryService`].
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: PgStore,
    orders: QueryService<PgStore>,
}

impl AppState {
    /// Create a new application state around `store` and `cache`.
    #[must_use]
    pub fn new(store: PgStore, cache: OrderCache) -> Self {
        let orders = QueryService::new(store.clone(), cache);

        Self {
            inner: Arc::new(AppStateInner { store, orders }),
        }
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        self.inner.store.pool()
    }

    #[must_use]
    pub fn store(&self) -> &PgStore {
        &self.inner.store
    }

    /// Get a reference to the order lookup service.
    #[must_use]
    pub fn orders(&self) -> &QueryService<PgStore> {
        &self.inner.orders
    }
}
