//! Bus publisher for load and smoke testing.
//!
//! Reads one order document and publishes numbered copies of it. Each copy
//! has the counter written over the tail of every unique field, so the
//! copies ingest as distinct orders:
//!
//! - `order_uid`, `track_number`
//! - `delivery.phone`, `delivery.email`
//! - `payment.transaction`, `payment.request_id`
//!
//! # Environment Variables
//!
//! - `NATS_URL` - Bus address (default: nats://127.0.0.1:4222)
//! - `NATS_SUBJECT` - Subject to publish on (default: orders)

use std::path::PathBuf;
use std::time::Duration;

use orderly_core::Order;
use thiserror::Error;

/// Errors that can occur while publishing.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid order document: {0}")]
    InvalidOrder(#[from] serde_json::Error),

    #[error("Failed to connect to bus: {0}")]
    Connect(#[from] async_nats::ConnectError),

    #[error("Failed to publish: {0}")]
    Publish(#[from] async_nats::PublishError),

    #[error("Failed to flush: {0}")]
    Flush(#[from] async_nats::client::FlushError),
}

/// Options for [`run`].
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub file: PathBuf,
    /// Stop after this many orders; `None` publishes until interrupted.
    pub count: Option<u64>,
    pub interval: Duration,
    pub subject: Option<String>,
}

/// Publish numbered copies of the order in `options.file`.
pub async fn run(options: PublishOptions) -> Result<(), PublishError> {
    dotenvy::dotenv().ok();

    let raw = std::fs::read(&options.file).map_err(|source| PublishError::Read {
        path: options.file.clone(),
        source,
    })?;
    let template = Order::from_slice(&raw)?;

    let url = std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".to_string());
    let subject = options
        .subject
        .or_else(|| std::env::var("NATS_SUBJECT").ok())
        .unwrap_or_else(|| "orders".to_string());

    let client = async_nats::connect(url.as_str()).await?;
    tracing::info!(%url, %subject, "Connected to message bus");

    let mut published = 0_u64;
    loop {
        if options.count.is_some_and(|count| published >= count) {
            break;
        }

        let order = numbered(&template, published);
        let payload = serde_json::to_vec(&order)?;
        client.publish(subject.clone(), payload.into()).await?;
        tracing::info!(order_uid = %order.order_uid, "Published order");
        published += 1;

        tokio::select! {
            () = tokio::time::sleep(options.interval) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    client.flush().await?;
    tracing::info!(published, "Done");
    Ok(())
}

/// Copy of `template` with `n` written over the tail of its unique fields.
#[must_use]
pub fn numbered(template: &Order, n: u64) -> Order {
    let suffix = n.to_string();
    let mut order = template.clone();

    order.order_uid = replace_suffix(order.order_uid.as_str(), &suffix).into();
    order.track_number = replace_suffix(&order.track_number, &suffix);
    order.delivery.phone = replace_suffix(order.delivery.phone.as_str(), &suffix).into();
    order.delivery.email = replace_suffix(&order.delivery.email, &suffix);
    if let Some(payment) = order.payment.as_mut() {
        payment.transaction = replace_suffix(payment.transaction.as_str(), &suffix).into();
        payment.request_id = replace_suffix(&payment.request_id, &suffix);
    }

    order
}

/// Overwrite the last characters of `s` with `suffix`.
///
/// When `s` is no longer than `suffix` the result is `suffix` alone.
#[must_use]
pub fn replace_suffix(s: &str, suffix: &str) -> String {
    let suffix_len = suffix.chars().count();
    let len = s.chars().count();

    let mut out: String = s.chars().take(len.saturating_sub(suffix_len)).collect();
    out.push_str(suffix);
    out
}
