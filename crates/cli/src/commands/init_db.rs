//! Schema bootstrap.
//!
//! # Usage
//!
//! ```bash
//! orderly-cli init-db
//! ```
//!
//! Every statement is `CREATE ... IF NOT EXISTS`, so running it against an
//! initialized database is a no-op.

use super::{DbCommandError, connect};

/// Apply the schema.
pub async fn run() -> Result<(), DbCommandError> {
    let pool = connect().await?;

    tracing::info!("Applying schema...");
    orderly_server::db::apply_schema(&pool).await?;

    tracing::info!("Schema ready");
    Ok(())
}
