//! API route handlers for the droidscope server.

pub mod health;
pub mod jobs;
pub mod results;
pub mod stream;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health     - Health check
/// - POST /api/run-test   - Start an exploration job
/// - POST /api/stop-agent - Stop the running job
/// - GET  /api/status     - Current job snapshot
/// - GET  /api/progress   - SSE stream of progress events
/// - GET  /api/logs       - SSE stream of log events
/// - GET  /api/results    - Normalized UX analysis of the last run
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", jobs::router())
        .nest("/api", stream::router())
        .nest("/api", results::router())
        .with_state(state)
}
