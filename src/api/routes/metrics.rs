//! Usage metrics route.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::server::AppState;

/// GET /metrics — usage counters and cache occupancy.
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<Value> {
    let invoker = &state.invoker;
    Json(json!({
        "usage": invoker.metrics().snapshot(),
        "cache": { "entries": invoker.cache().len() },
        "upstream": {
            "model": state.model,
            "credentials": invoker.has_credentials(),
        },
    }))
}
