// crates/server/src/routes/jobs.rs
//! Exploration job routes.
//!
//! - POST /run-test   - Start an exploration job
//! - POST /stop-agent - Request cancellation of the running job
//! - GET  /status     - Snapshot of the current job

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::jobs::types::{DEFAULT_APP_NAME, DEFAULT_CATEGORY, DEFAULT_MAX_DEPTH};
use crate::jobs::{JobRequest, JobStatus};
use crate::state::AppState;

/// Request body for POST /api/run-test. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct RunTestRequest {
    pub app_name: Option<String>,
    pub category: Option<String>,
    /// A number or a numeric string.
    pub max_depth: Option<Value>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct RunTestResponse {
    pub status: String,
    pub app_name: String,
    pub category: String,
    pub max_depth: u32,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct StopResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn parse_max_depth(value: Option<&Value>) -> ApiResult<u32> {
    let invalid = || ApiError::BadRequest("max_depth must be a non-negative integer".to_string());
    match value {
        None | Some(Value::Null) => Ok(DEFAULT_MAX_DEPTH),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

fn non_blank(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl RunTestRequest {
    fn into_job(self) -> ApiResult<JobRequest> {
        Ok(JobRequest {
            max_depth: parse_max_depth(self.max_depth.as_ref())?,
            app_name: non_blank(self.app_name, DEFAULT_APP_NAME),
            category: non_blank(self.category, DEFAULT_CATEGORY),
        })
    }
}

/// POST /api/run-test - Start an exploration job.
///
/// An empty body starts a job with every default.
async fn run_test(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<RunTestResponse>> {
    let body: RunTestRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RunTestRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))?
    };
    let job = body.into_job()?;

    state.jobs.start(job.clone())?;

    Ok(Json(RunTestResponse {
        status: "started".to_string(),
        app_name: job.app_name,
        category: job.category,
        max_depth: job.max_depth,
    }))
}

/// POST /api/stop-agent - Request cancellation.
///
/// Always 200; `success` tells whether a job was running.
async fn stop_agent(State(state): State<Arc<AppState>>) -> Json<StopResponse> {
    match state.jobs.request_stop() {
        Ok(()) => Json(StopResponse {
            success: true,
            message: Some("Stop signal sent to agent".to_string()),
            error: None,
        }),
        Err(e) => Json(StopResponse {
            success: false,
            message: None,
            error: Some(e.to_string()),
        }),
    }
}

/// GET /api/status - Current job snapshot.
async fn job_status(State(state): State<Arc<AppState>>) -> Json<JobStatus> {
    Json(state.jobs.status())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/run-test", post(run_test))
        .route("/stop-agent", post(stop_agent))
        .route("/status", get(job_status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_max_depth_accepts_number_and_numeric_string() {
        assert_eq!(parse_max_depth(Some(&json!(4))).unwrap(), 4);
        assert_eq!(parse_max_depth(Some(&json!(" 8 "))).unwrap(), 8);
        assert_eq!(parse_max_depth(None).unwrap(), DEFAULT_MAX_DEPTH);
        assert_eq!(parse_max_depth(Some(&Value::Null)).unwrap(), DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_max_depth_rejects_garbage() {
        for bad in [json!("deep"), json!(-1), json!(2.5), json!([3]), json!(true)] {
            assert!(
                matches!(parse_max_depth(Some(&bad)), Err(ApiError::BadRequest(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_defaults_fill_missing_and_blank_fields() {
        let job = RunTestRequest {
            app_name: Some("  ".into()),
            category: None,
            max_depth: None,
        }
        .into_job()
        .unwrap();
        assert_eq!(job, JobRequest::default());
    }
}
