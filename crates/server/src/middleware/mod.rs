//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span with method, uri, status, latency)
//! 3. Request ID (records `request_id` on the span)
//! 4. Compression (gzip)

pub mod request_id;

pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
