//! Order lookup route.

use axum::extract::{Path, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};

use orderly_core::OrderUid;

use crate::error::Result;
use crate::state::AppState;

/// Header reporting whether the response was served from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// `GET /order/{id}`
///
/// Responds with the pretty-printed order. A missing order is reported as a
/// server error, like any other store failure.
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let lookup = state.orders().get_order(&OrderUid::new(id)).await?;
    let cache_status = HeaderValue::from_static(if lookup.is_hit() { "hit" } else { "miss" });

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            ),
            (
                header::HeaderName::from_static(CACHE_STATUS_HEADER),
                cache_status,
            ),
        ],
        lookup.into_bytes(),
    )
        .into_response())
}
