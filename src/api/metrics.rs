//! Prometheus-compatible `/metrics` endpoint.
//!
//! Serves the gauge board in Prometheus text exposition format
//! (text/plain; version=0.0.4).

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use super::AppState;

/// GET /metrics — Prometheus scrape endpoint.
pub async fn handler(State(state): State<AppState>) -> Response {
    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.gauges.render(),
    )
        .into_response()
}
