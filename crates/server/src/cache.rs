//! In-memory read-through cache of serialized orders.
//!
//! Entries are the exact bytes served by the lookup endpoint. Capacity is
//! enforced least-recently-used, and every entry also expires a fixed time
//! after insertion regardless of how often it is read.

use std::time::Duration;

use axum::body::Bytes;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use tracing::{info, instrument, warn};

use orderly_core::OrderUid;

use crate::query::OrderReader;

/// Outcome of [`OrderCache::warm`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmStats {
    /// Orders loaded into the cache.
    pub loaded: usize,
    /// History entries that could not be loaded.
    pub skipped: usize,
}

/// Bounded LRU cache with per-entry TTL.
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct OrderCache {
    entries: Cache<OrderUid, Bytes>,
    capacity: u64,
    ttl: Duration,
}

impl std::fmt::Debug for OrderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderCache")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl OrderCache {
    /// Create an empty cache holding at most `capacity` orders for `ttl` each.
    #[must_use]
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self {
            entries,
            capacity,
            ttl,
        }
    }

    /// Cached bytes for `id`, if present and not expired.
    ///
    /// A hit makes the entry most recently used but does not extend its TTL.
    pub async fn get(&self, id: &OrderUid) -> Option<Bytes> {
        self.entries.get(id).await
    }

    /// Insert or overwrite the entry for `id`, restarting its TTL.
    ///
    /// When the cache is over capacity, the least recently used entry has
    /// been evicted by the time this returns.
    pub async fn add(&self, id: OrderUid, bytes: Bytes) {
        self.entries.insert(id, bytes).await;
        self.entries.run_pending_tasks().await;
    }

    /// Number of resident entries.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Maximum number of entries.
    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Preload the most recently looked up orders.
    ///
    /// Orders are inserted oldest first so the newest lookups end up most
    /// recently used. Orders that fail to load are logged and skipped; if
    /// the history itself cannot be read the cache stays empty.
    #[instrument(skip_all, fields(capacity = self.capacity))]
    pub async fn warm<R: OrderReader>(&self, store: &R) -> WarmStats {
        let limit = usize::try_from(self.capacity).unwrap_or(usize::MAX);
        let ids = match store.get_history_interval(limit).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Failed to read lookup history, starting with an empty cache");
                return WarmStats::default();
            }
        };

        let mut stats = WarmStats::default();
        for id in ids.into_iter().rev() {
            let order = match store.get_data_by_id(&id).await {
                Ok(order) => order,
                Err(e) => {
                    warn!(order_uid = %id, error = %e, "Skipping order during cache warm-up");
                    stats.skipped += 1;
                    continue;
                }
            };

            match order.to_pretty_json() {
                Ok(bytes) => {
                    self.add(id, Bytes::from(bytes)).await;
                    stats.loaded += 1;
                }
                Err(e) => {
                    warn!(order_uid = %id, error = %e, "Failed to serialize order during cache warm-up");
                    stats.skipped += 1;
                }
            }
        }

        info!(loaded = stats.loaded, skipped = stats.skipped, "Cache warmed");
        stats
    }
}
