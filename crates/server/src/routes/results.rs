// crates/server/src/routes/results.rs
//! GET /results - the normalized UX analysis of the last successful run.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use crate::error::ApiResult;
use crate::state::AppState;

async fn get_results(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let document = state.store.load_analysis().await?;
    Ok(Json(document))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/results", get(get_results))
}
