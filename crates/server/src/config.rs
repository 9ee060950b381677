//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ORDERLY_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ORDERLY_CACHE_CAPACITY` - Maximum number of cached orders (> 0)
//! - `ORDERLY_CACHE_TTL_SECS` - Lifetime of a cached order in seconds (> 0, at most 1000 years)
//!
//! ## Optional
//! - `ORDERLY_HOST` - Bind address (default: 0.0.0.0)
//! - `ORDERLY_PORT` - Listen port (default: 8000)
//! - `ORDERLY_STORE_TIMEOUT_SECS` - Bound on each store operation (default: 10)
//! - `ORDERLY_INGEST_CONCURRENCY` - Bus messages processed at once (default: 4)
//! - `ORDERLY_LOG_JSON` - Emit JSON log lines when `1` or `true`
//! - `NATS_URL` - Bus address (default: nats://127.0.0.1:4222)
//! - `NATS_SUBJECT` - Subject carrying orders (default: orders)
//! - `NATS_QUEUE_GROUP` - Queue group shared by cooperating consumers
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    pub cache: CacheConfig,
    /// Upper bound on a single store operation
    pub store_timeout: Duration,
    /// Maximum number of bus messages processed concurrently
    pub ingest_concurrency: usize,
    pub bus: BusConfig,
    /// Emit JSON log lines instead of text
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// Sizing of the order cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries
    pub capacity: u64,
    /// Lifetime of an entry from insertion
    pub ttl: Duration,
}

/// Message bus connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub url: String,
    /// Subject carrying order messages
    pub subject: String,
    /// Consumers sharing a queue group split the message stream
    pub queue_group: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let database_url = env
            .get("ORDERLY_DATABASE_URL")
            .or_else(|| env.get("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("ORDERLY_DATABASE_URL".to_string()))?;

        let host = env.parse_or("ORDERLY_HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port = env.parse_or("ORDERLY_PORT", 8000)?;
        let cache = CacheConfig::from_env(&env)?;
        let store_timeout = Duration::from_secs(env.parse_or("ORDERLY_STORE_TIMEOUT_SECS", 10)?);
        let ingest_concurrency = env.parse_or("ORDERLY_INGEST_CONCURRENCY", 4)?;
        if ingest_concurrency == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "ORDERLY_INGEST_CONCURRENCY".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let bus = BusConfig::from_env(&env);
        let log_json = env
            .get("ORDERLY_LOG_JSON")
            .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true"));

        Ok(Self {
            database_url,
            host,
            port,
            cache,
            store_timeout,
            ingest_concurrency,
            bus,
            log_json,
            sentry_dsn: env.get("SENTRY_DSN"),
            sentry_environment: env.get("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env.parse_or("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: env.parse_or("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Longest entry lifetime the cache accepts (1000 years).
pub const MAX_CACHE_TTL_SECS: u64 = 1000 * 365 * 24 * 3600;

impl CacheConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let capacity: u64 = env.parse_required("ORDERLY_CACHE_CAPACITY")?;
        let ttl_secs: u64 = env.parse_required("ORDERLY_CACHE_TTL_SECS")?;

        for (key, value) in [
            ("ORDERLY_CACHE_CAPACITY", capacity),
            ("ORDERLY_CACHE_TTL_SECS", ttl_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidEnvVar(
                    key.to_string(),
                    "must be greater than zero".to_string(),
                ));
            }
        }
        if ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::InvalidEnvVar(
                "ORDERLY_CACHE_TTL_SECS".to_string(),
                format!("must be at most {MAX_CACHE_TTL_SECS}"),
            ));
        }

        Ok(Self {
            capacity,
            ttl: Duration::from_secs(ttl_secs),
        })
    }
}

impl BusConfig {
    fn from_env(env: &Env<'_>) -> Self {
        Self {
            url: env.get_or("NATS_URL", "nats://127.0.0.1:4222"),
            subject: env.get_or("NATS_SUBJECT", "orders"),
            queue_group: env.get("NATS_QUEUE_GROUP"),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable lookup shared by the config sections.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional variable, treating an empty value as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.is_empty())
    }

    /// Get a variable with a default value.
    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a required variable.
    fn parse_required<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let value = self
            .get(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
        parse(key, &value)
    }

    /// Parse an optional variable, falling back to `default`.
    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key).map_or(Ok(default), |value| parse(key, &value))
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
