//! Orderly Core - Record schema shared by every Orderly component.
//!
//! This crate provides the order entity shapes used across the workspace:
//! - `server` - Bus ingestion, relational store, cache and lookup API
//! - `cli` - Schema bootstrap, bus publisher and maintenance commands
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no bus
//! clients. With the `postgres` feature the key newtypes also implement the
//! `sqlx` encoding traits so they bind directly into queries.
//!
//! # Modules
//!
//! - [`types`] - Order aggregate, its parts, and type-safe keys

#![cfg_attr(not(test), forbid(unsafe_code))]

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod types;

pub use types::*;
