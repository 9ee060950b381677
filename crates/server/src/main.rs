//! Orderly server.
//!
//! # Architecture
//!
//! - NATS consumer task writing each order message to `PostgreSQL` in one
//!   transaction
//! - Axum HTTP server answering `GET /order/{id}` from a moka cache, falling
//!   back to the database
//! - Cache warmed at startup from the lookup history
//!
//! The schema is NOT applied on startup. Run `orderly-cli init-db` first.

#![cfg_attr(not(test), forbid(unsafe_code))]

use orderly_server::cache::OrderCache;
use orderly_server::config::ServerConfig;
use orderly_server::db::{self, PgStore};
use orderly_server::ingest::Ingestor;
use orderly_server::ingest::nats::Consumer;
use orderly_server::routes;
use orderly_server::state::AppState;
use sentry::integrations::tracing as sentry_tracing;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ServerConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = ServerConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "orderly_server=info,tower_http=debug".into());

    let json_layer = config
        .log_json
        .then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!config.log_json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    let store = PgStore::new(pool, config.store_timeout);

    let cache = OrderCache::new(config.cache.capacity, config.cache.ttl);
    cache.warm(&store).await;

    let state = AppState::new(store.clone(), cache);

    // Bus consumer runs until shutdown, then drains in-flight messages
    let shutdown = CancellationToken::new();
    let consumer = Consumer::connect(config.bus.clone())
        .await
        .expect("Failed to connect to message bus");
    let consumer_task = tokio::spawn(consumer.run(
        Ingestor::new(store),
        config.ingest_concurrency,
        shutdown.clone(),
    ));

    let app = routes::router(state);

    let addr = config.socket_addr();
    tracing::info!("orderly listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_shutdown.cancel();
        })
        .await
        .expect("Server error");

    shutdown.cancel();
    match consumer_task.await {
        Ok(Ok(_stats)) => tracing::info!("Bus consumer stopped"),
        Ok(Err(e)) => tracing::error!(error = %e, "Bus consumer failed"),
        Err(e) => tracing::error!(error = %e, "Bus consumer task panicked"),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
