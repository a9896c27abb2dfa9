//! Status API handlers.
//!
//! Lookups that find nothing still answer 200 with a `"status": "no value"`
//! body.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use super::StatusState;

const NO_VALUE: &str = "no value";

/// GET /ping
pub async fn ping() -> &'static str {
    "pong"
}

/// GET /containers
pub async fn list_containers(State(state): State<StatusState>) -> Response {
    let records = state.store.snapshot().await;
    if records.is_empty() {
        Json(json!({ "status": NO_VALUE })).into_response()
    } else {
        Json(records).into_response()
    }
}

/// GET /container/{name}
pub async fn get_container(
    State(state): State<StatusState>,
    Path(name): Path<String>,
) -> Response {
    match state.store.find_by_name(&name).await {
        Some(record) => Json(record).into_response(),
        None => Json(json!({ "container": name, "status": NO_VALUE })).into_response(),
    }
}
