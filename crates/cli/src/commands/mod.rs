//! Subcommand implementations.

pub mod delete;
pub mod init_db;
pub mod publish;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Errors shared by the database commands.
#[derive(Debug, Error)]
pub enum DbCommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] orderly_server::db::StoreError),
}

/// Connect to the database named by `ORDERLY_DATABASE_URL` or `DATABASE_URL`.
async fn connect() -> Result<PgPool, DbCommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("ORDERLY_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| DbCommandError::MissingEnvVar("ORDERLY_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(orderly_server::db::create_pool(&database_url).await?)
}
