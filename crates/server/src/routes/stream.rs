// crates/server/src/routes/stream.rs
//! Live telemetry streams.
//!
//! - GET /progress - SSE of progress events
//! - GET /logs     - SSE of log events

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::stream::sse_response;

/// GET /api/progress - ends after a 100% or aborted event.
async fn stream_progress(State(state): State<Arc<AppState>>) -> Response {
    tracing::debug!("progress stream opened");
    sse_response(Arc::clone(&state.telemetry.progress), state.config.keepalive)
}

/// GET /api/logs - ends after the job's final log event.
async fn stream_logs(State(state): State<Arc<AppState>>) -> Response {
    tracing::debug!("log stream opened");
    sse_response(Arc::clone(&state.telemetry.logs), state.config.keepalive)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/progress", get(stream_progress))
        .route("/logs", get(stream_logs))
}
