//! Orderly server library.
//!
//! Ingests orders from the message bus into `PostgreSQL` and serves them
//! through a read-through cache. Exposed as a library so the binary, the CLI
//! and the integration tests share one implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod middleware;
pub mod query;
pub mod routes;
pub mod state;
