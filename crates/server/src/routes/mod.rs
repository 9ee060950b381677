//! HTTP routes.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health          - Liveness check
//! GET  /health/ready    - Readiness check (database reachable)
//! GET  /order/{id}      - Pretty-printed order JSON
//! ```

pub mod health;
pub mod orders;

use axum::{Router, middleware, routing::get};
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Build the application router with its full middleware stack.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/order/{id}", get(orders::show))
        .layer(CompressionLayer::new().gzip(true))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::cache::OrderCache;
    use crate::db::PgStore;
    use crate::middleware::REQUEST_ID_HEADER;

    /// State whose database is unreachable.
    fn offline_state() -> AppState {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://orderly@127.0.0.1:1/orderly")
            .unwrap();
        let store = PgStore::new(pool, Duration::from_secs(2));
        AppState::new(store, OrderCache::new(8, Duration::from_secs(60)))
    }

    async fn get(app: Router, uri: &str) -> axum::response::Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_is_ok_without_database() {
        let response = get(router(offline_state()), "/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"ok");
    }

    #[tokio::test]
    async fn test_readiness_reports_unreachable_database() {
        let response = get(router(offline_state()), "/health/ready").await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_order_lookup_store_failure_is_server_error() {
        let response = get(router(offline_state()), "/order/A1").await;

        assert!(response.status().is_server_error());
    }

    #[tokio::test]
    async fn test_cached_order_is_served_without_database() {
        let state = offline_state();
        state
            .orders()
            .cache()
            .add(
                orderly_core::OrderUid::new("A1"),
                axum::body::Bytes::from_static(b"{\n  \"order_uid\": \"A1\"\n}"),
            )
            .await;

        let response = get(router(state), "/order/A1").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(axum::http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(response.headers().get("x-cache").unwrap(), "hit");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"{\n  \"order_uid\": \"A1\"\n}");
    }
}
