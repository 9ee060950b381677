//! Orderly CLI - Schema bootstrap, bus publisher and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Create the database schema
//! orderly-cli init-db
//!
//! # Publish the sample order every second, forever
//! orderly-cli publish
//!
//! # Publish 100 distinct orders, 50ms apart
//! orderly-cli publish --file crates/cli/order.json --count 100 --interval-ms 50
//!
//! # Delete an order with its items, payment and history
//! orderly-cli delete --order-id b563feb7b2b84b6tes0
//! ```
//!
//! # Commands
//!
//! - `init-db` - Apply `crates/server/sql/schema.sql`
//! - `publish` - Publish numbered copies of a sample order to the bus
//! - `delete` - Remove an order from the store

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "orderly-cli")]
#[command(author, version, about = "Orderly CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create any missing tables and indexes
    InitDb,
    /// Publish numbered copies of a sample order
    Publish {
        /// Order document to publish
        #[arg(short, long, default_value = "crates/cli/order.json")]
        file: PathBuf,

        /// Number of orders to publish (default: until interrupted)
        #[arg(short, long)]
        count: Option<u64>,

        /// Delay between two orders, in milliseconds
        #[arg(short, long, default_value_t = 1000)]
        interval_ms: u64,

        /// Subject to publish on (default: `NATS_SUBJECT` or `orders`)
        #[arg(short, long)]
        subject: Option<String>,
    },
    /// Delete an order with its items, payment and lookup history
    Delete {
        /// Uid of the order to delete
        #[arg(short, long)]
        order_id: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::InitDb => commands::init_db::run().await?,
        Commands::Publish {
            file,
            count,
            interval_ms,
            subject,
        } => {
            let options = commands::publish::PublishOptions {
                file,
                count,
                interval: std::time::Duration::from_millis(interval_ms),
                subject,
            };
            commands::publish::run(options).await?;
        }
        Commands::Delete { order_id } => commands::delete::run(&order_id).await?,
    }
    Ok(())
}
