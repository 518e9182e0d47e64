//! Prompt endpoints: `/ai`, `/profile`, `/future`.
//!
//! Each renders its template, runs one invocation and maps the outcome to
//! HTTP: success → 200 with the upstream JSON, config error → 500,
//! rate limited → 503 with `Retry-After`, upstream error → 502,
//! transport failure → 500.

use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::server::AppState;
use crate::invoker::InvokeResult;
use crate::prompts::{PromptInput, PromptKind};

/// Suggested client backoff after an upstream 429.
pub const RETRY_AFTER_SECS: u64 = 30;

pub async fn ai(State(state): State<Arc<AppState>>, Json(input): Json<PromptInput>) -> Response {
    generate(&state, PromptKind::Ai, input).await
}

pub async fn profile(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PromptInput>,
) -> Response {
    generate(&state, PromptKind::Profile, input).await
}

pub async fn future(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PromptInput>,
) -> Response {
    generate(&state, PromptKind::Future, input).await
}

async fn generate(state: &AppState, kind: PromptKind, input: PromptInput) -> Response {
    if input.text.trim().is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": { "kind": "invalid_request", "message": "text is required" } })),
        )
            .into_response();
    }

    let prompt = kind.render(&input, &state.ai_name);
    let result = state.invoker.invoke(&prompt, &state.model).await;
    invoke_result_response(result)
}

/// Status code and JSON body for an invocation outcome.
pub fn status_and_body(result: InvokeResult) -> (StatusCode, Value) {
    match result {
        InvokeResult::Success(payload) => (StatusCode::OK, payload),
        InvokeResult::ConfigError(reason) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": { "kind": "config_error", "message": reason } }),
        ),
        InvokeResult::RateLimited(body) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "error": {
                    "kind": "rate_limited",
                    "message": "Upstream service is temporarily unavailable, retry later",
                    "retry_after_secs": RETRY_AFTER_SECS,
                    "upstream": body,
                }
            }),
        ),
        InvokeResult::UpstreamError { status, body } => (
            StatusCode::BAD_GATEWAY,
            json!({
                "error": {
                    "kind": "upstream_error",
                    "message": format!("Upstream returned status {}", status),
                    "upstream_status": status,
                    "upstream": body,
                }
            }),
        ),
        InvokeResult::TransportFailure(reason) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": { "kind": "transport_failure", "message": reason } }),
        ),
    }
}

/// Convert an invocation outcome into an HTTP response.
pub fn invoke_result_response(result: InvokeResult) -> Response {
    let rate_limited = matches!(result, InvokeResult::RateLimited(_));
    let (status, body) = status_and_body(result);
    let mut response = (status, Json(body)).into_response();
    if rate_limited {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
    }
    response
}
