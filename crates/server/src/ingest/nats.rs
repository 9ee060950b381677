//! NATS subscription feeding the [`Ingestor`].

use futures::StreamExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use super::{IngestStats, Ingestor, OrderWriter};
use crate::config::BusConfig;

/// Errors establishing the bus subscription.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: async_nats::ConnectError,
    },

    #[error("failed to subscribe to {subject}: {source}")]
    Subscribe {
        subject: String,
        #[source]
        source: async_nats::SubscribeError,
    },
}

/// A connected bus consumer.
#[derive(Debug)]
pub struct Consumer {
    client: async_nats::Client,
    config: BusConfig,
}

impl Consumer {
    /// Connect to the bus described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Connect` if the server cannot be reached.
    pub async fn connect(config: BusConfig) -> Result<Self, BusError> {
        let client = async_nats::connect(config.url.as_str())
            .await
            .map_err(|source| BusError::Connect {
                url: config.url.clone(),
                source,
            })?;

        info!(url = %config.url, "Connected to message bus");
        Ok(Self { client, config })
    }

    /// Subscribe and ingest messages until `shutdown` is cancelled.
    ///
    /// Messages already in flight when shutdown is requested are finished
    /// before this returns.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Subscribe` if the subscription cannot be created.
    #[instrument(skip_all, fields(subject = %self.config.subject))]
    pub async fn run<W: OrderWriter>(
        self,
        ingestor: Ingestor<W>,
        concurrency: usize,
        shutdown: CancellationToken,
    ) -> Result<IngestStats, BusError> {
        let subject = self.config.subject.clone();
        let subscribed = match &self.config.queue_group {
            Some(group) => {
                self.client
                    .queue_subscribe(subject.clone(), group.clone())
                    .await
            }
            None => self.client.subscribe(subject.clone()).await,
        };
        let subscriber = subscribed.map_err(|source| BusError::Subscribe {
            subject: subject.clone(),
            source,
        })?;

        info!(
            queue_group = self.config.queue_group.as_deref(),
            concurrency, "Consuming orders"
        );

        let messages = subscriber
            .map(|message| message.payload)
            .take_until(shutdown.cancelled_owned());

        Ok(ingestor.run(messages, concurrency).await)
    }
}
