//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Storage errors carry no HTTP
//! semantics of their own; this module is the only place that maps them to
//! status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::StoreErrorKind;
use crate::query::QueryError;

/// Application-level error type for the HTTP surface.
#[derive(Debug, Error)]
pub enum AppError {
    /// An order lookup failed.
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl AppError {
    /// HTTP status for this error. Every lookup failure, including a missing
    /// order, is a server-side error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Query(QueryError::Store(err)) => match err.kind() {
                StoreErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                StoreErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
                StoreErrorKind::NotFound
                | StoreErrorKind::Conflict
                | StoreErrorKind::Malformed => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Query(QueryError::Serialize(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain text body sent to the client.
    fn public_message(&self) -> String {
        match self {
            Self::Query(QueryError::Store(err)) => match err.kind() {
                StoreErrorKind::NotFound => err.to_string(),
                StoreErrorKind::Timeout => "Store timed out".to_string(),
                StoreErrorKind::Transient => "Store unavailable".to_string(),
                StoreErrorKind::Conflict | StoreErrorKind::Malformed => {
                    "Internal server error".to_string()
                }
            },
            Self::Query(QueryError::Serialize(_)) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                status = status.as_u16(),
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, self.public_message()).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::body::to_bytes;
    use axum::http::header;

    use super::*;
    use crate::db::StoreError;

    fn store_error(err: StoreError) -> AppError {
        AppError::Query(QueryError::Store(err))
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            store_error(StoreError::not_found("order", "A1")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            store_error(StoreError::Timeout(Duration::from_secs(10))).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            store_error(StoreError::Database(sqlx::Error::PoolTimedOut)).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_rollback_failure_maps_by_cause() {
        let err = store_error(StoreError::RollbackFailed {
            cause: Box::new(StoreError::Timeout(Duration::from_secs(1))),
            rollback: Box::new(StoreError::Database(sqlx::Error::PoolClosed)),
        });

        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_not_found_response_is_plain_text() {
        let response = store_error(StoreError::not_found("order", "A1")).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/plain"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"order A1 not found");
    }

    #[tokio::test]
    async fn test_database_details_are_not_exposed() {
        let response = store_error(StoreError::Database(sqlx::Error::Protocol(
            "secret detail".to_string(),
        )))
        .into_response();

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"Store unavailable");
    }
}
