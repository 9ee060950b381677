//! Order ingestion from the message bus.
//!
//! Each message carries one JSON order. A message is decoded, then written
//! across all store tables in one transaction. Failed messages are logged
//! and dropped; nothing is retried or requeued, and the cache is never
//! touched.

pub mod nats;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Bytes;
use futures::{Stream, StreamExt};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use orderly_core::{Order, OrderUid};

use crate::db::{PgStore, StoreError, StoreErrorKind};

/// Write side of the store, as needed by ingestion.
pub trait OrderWriter: Clone + Send + Sync + 'static {
    /// Store an order atomically.
    fn save_order(&self, order: &Order) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl OrderWriter for PgStore {
    fn save_order(&self, order: &Order) -> impl Future<Output = Result<(), StoreError>> + Send {
        Self::save_order(self, order)
    }
}

/// Errors from ingesting a single message.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The message is not a valid order. Nothing was written.
    #[error("malformed order message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The order could not be stored. Nothing was written.
    #[error("failed to store order {order_uid}: {source}")]
    Store {
        order_uid: OrderUid,
        #[source]
        source: StoreError,
    },
}

impl IngestError {
    /// Uid of the affected order, when the message could be decoded.
    #[must_use]
    pub const fn order_uid(&self) -> Option<&OrderUid> {
        match self {
            Self::Malformed(_) => None,
            Self::Store { order_uid, .. } => Some(order_uid),
        }
    }
}

/// Counters for one ingestion run.
#[derive(Debug, Default)]
pub struct IngestStats {
    stored: AtomicU64,
    malformed: AtomicU64,
    conflicts: AtomicU64,
    failed: AtomicU64,
}

impl IngestStats {
    #[must_use]
    pub fn stored(&self) -> u64 {
        self.stored.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Orders rejected because their uid or payment was already stored.
    #[must_use]
    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    /// Orders that failed for any other store reason.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    fn record(&self, result: &Result<OrderUid, IngestError>) {
        let counter = match result {
            Ok(_) => &self.stored,
            Err(IngestError::Malformed(_)) => &self.malformed,
            Err(IngestError::Store { source, .. }) if source.kind() == StoreErrorKind::Conflict => {
                &self.conflicts
            }
            Err(IngestError::Store { .. }) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Turns raw bus messages into stored orders.
#[derive(Debug, Clone)]
pub struct Ingestor<W> {
    store: W,
}

impl<W: OrderWriter> Ingestor<W> {
    #[must_use]
    pub const fn new(store: W) -> Self {
        Self { store }
    }

    /// Decode and store one message.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::Malformed` without touching the store if the
    /// payload is not an order, or `IngestError::Store` if writing fails.
    pub async fn handle(&self, payload: &[u8]) -> Result<OrderUid, IngestError> {
        let order = Order::from_slice(payload)?;

        match self.store.save_order(&order).await {
            Ok(()) => Ok(order.order_uid),
            Err(source) => Err(IngestError::Store {
                order_uid: order.order_uid,
                source,
            }),
        }
    }

    /// Consume `messages` until the stream ends, with at most `concurrency`
    /// messages in flight.
    ///
    /// Per-message failures are logged and the message is dropped.
    pub async fn run<S>(&self, messages: S, concurrency: usize) -> IngestStats
    where
        S: Stream<Item = Bytes> + Send,
    {
        let stats = IngestStats::default();

        messages
            .for_each_concurrent(concurrency, |payload| {
                let stats = &stats;
                async move {
                    let result = self.handle(&payload).await;
                    log_outcome(&result);
                    stats.record(&result);
                }
            })
            .await;

        info!(
            stored = stats.stored(),
            malformed = stats.malformed(),
            conflicts = stats.conflicts(),
            failed = stats.failed(),
            "Ingestion stopped"
        );
        stats
    }
}

fn log_outcome(result: &Result<OrderUid, IngestError>) {
    match result {
        Ok(order_uid) => debug!(%order_uid, "Order ingested"),
        Err(err @ IngestError::Malformed(_)) => {
            warn!(error = %err, "Dropping malformed message");
        }
        Err(err @ IngestError::Store { order_uid, source }) => {
            if source.kind() == StoreErrorKind::Conflict {
                warn!(%order_uid, error = %err, "Dropping conflicting order");
            } else {
                error!(%order_uid, error = %err, "Dropping order after store failure");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use orderly_core::TransactionId;
    use orderly_core::fixtures::{SAMPLE_ORDER_JSON, sample_order_with_uid};

    use super::*;

    /// Enforces unique order uids and payment transactions like the schema.
    #[derive(Clone, Default)]
    struct MemoryWriter {
        orders: Arc<Mutex<Vec<Order>>>,
        transactions: Arc<Mutex<HashSet<TransactionId>>>,
        delay: Option<Duration>,
    }

    impl OrderWriter for MemoryWriter {
        async fn save_order(&self, order: &Order) -> Result<(), StoreError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut orders = self.orders.lock().unwrap();
            let mut transactions = self.transactions.lock().unwrap();
            if orders.iter().any(|o| o.order_uid == order.order_uid) {
                return Err(StoreError::Conflict(format!("order {} already exists", order.order_uid)));
            }
            if let Some(tx) = order.transaction_id() {
                if !transactions.insert(tx.clone()) {
                    return Err(StoreError::Conflict(format!("payment {tx} already exists")));
                }
            }
            orders.push(order.clone());
            Ok(())
        }
    }

    fn payload(uid: &str) -> Bytes {
        Bytes::from(serde_json::to_vec(&sample_order_with_uid(uid)).unwrap())
    }

    #[tokio::test]
    async fn test_handle_stores_order() {
        let writer = MemoryWriter::default();
        let ingestor = Ingestor::new(writer.clone());

        let uid = ingestor.handle(SAMPLE_ORDER_JSON.as_bytes()).await.unwrap();

        assert_eq!(uid.as_str(), "b563feb7b2b84b6test");
        assert_eq!(writer.orders.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_message_never_reaches_store() {
        let writer = MemoryWriter::default();
        let ingestor = Ingestor::new(writer.clone());

        let err = ingestor.handle(b"{\"order_uid\": 1").await.unwrap_err();

        assert!(matches!(err, IngestError::Malformed(_)));
        assert!(err.order_uid().is_none());
        assert!(writer.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_redelivery_is_a_conflict() {
        let writer = MemoryWriter::default();
        let ingestor = Ingestor::new(writer.clone());

        ingestor.handle(&payload("A1")).await.unwrap();
        let err = ingestor.handle(&payload("A1")).await.unwrap_err();

        match err {
            IngestError::Store { order_uid, source } => {
                assert_eq!(order_uid.as_str(), "A1");
                assert_eq!(source.kind(), StoreErrorKind::Conflict);
            }
            IngestError::Malformed(e) => panic!("unexpected malformed error: {e}"),
        }
        assert_eq!(writer.orders.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_drops_failures_and_continues() {
        let writer = MemoryWriter::default();
        let ingestor = Ingestor::new(writer.clone());

        let messages = futures::stream::iter(vec![
            payload("A1"),
            Bytes::from_static(b"garbage"),
            payload("A1"),
            payload("A2"),
        ]);
        let stats = ingestor.run(messages, 1).await;

        assert_eq!(stats.stored(), 2);
        assert_eq!(stats.malformed(), 1);
        assert_eq!(stats.conflicts(), 1);
        assert_eq!(stats.failed(), 0);
    }

    #[tokio::test]
    async fn test_run_processes_messages_concurrently() {
        let writer = MemoryWriter {
            delay: Some(Duration::from_millis(200)),
            ..MemoryWriter::default()
        };
        let ingestor = Ingestor::new(writer.clone());

        let messages = futures::stream::iter((0..4).map(|i| payload(&format!("C{i}"))));
        let started = std::time::Instant::now();
        let stats = ingestor.run(messages, 4).await;

        assert_eq!(stats.stored(), 4);
        assert!(started.elapsed() < Duration::from_millis(700));
    }
}
