// crates/server/src/routes/health.rs
//! GET /health - liveness plus a one-glance view of the job slot.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::jobs::JobPhase;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub job_active: bool,
    pub job_phase: JobPhase,
}

impl HealthResponse {
    fn from_state(state: &AppState) -> Self {
        let job = state.jobs.status();
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: state.uptime_secs(),
            job_active: job.active,
            job_phase: job.phase,
        }
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse::from_state(&state))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}
