//! Axum API server for the prompt gateway.

use crate::config::{Config, ServerConfig};
use crate::error::Result;
use crate::invoker::UpstreamInvoker;
use crate::prompts::PromptKind;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::{extract::State, Json, Router};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Shared state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cache-fronted upstream caller.
    pub invoker: Arc<UpstreamInvoker>,
    /// Model id every prompt endpoint targets.
    pub model: String,
    /// Default persona name for templates and the root status line.
    pub ai_name: String,
}

impl AppState {
    pub fn new(invoker: Arc<UpstreamInvoker>, model: String, ai_name: String) -> Self {
        Self {
            invoker,
            model,
            ai_name,
        }
    }

    /// Build the invoker from config and wrap it in state.
    pub fn from_config(config: &Config) -> Result<Self> {
        let invoker = UpstreamInvoker::from_config(config)?;
        Ok(Self::new(
            Arc::new(invoker),
            config.gemini.model.clone(),
            config.persona.ai_name.clone(),
        ))
    }
}

/// Handler for `GET /`.
async fn root_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "status": format!("{} online", state.ai_name) }))
}

/// CORS: any origin when none are configured, otherwise an exact list.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    if origins.is_empty() {
        return base.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(parsed))
}

/// Build the axum router with all API routes.
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let shared_state = Arc::new(state);

    let mut router = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(super::routes::health::get_health))
        .route("/metrics", get(super::routes::metrics::get_metrics));

    for kind in PromptKind::ALL {
        let handler = match kind {
            PromptKind::Ai => post(super::routes::prompts::ai),
            PromptKind::Profile => post(super::routes::prompts::profile),
            PromptKind::Future => post(super::routes::prompts::future),
        };
        router = router.route(kind.path(), handler);
    }

    router
        .layer(DefaultBodyLimit::max(server.body_limit_bytes))
        .layer(cors_layer(&server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Start the API server and run until `shutdown` resolves.
pub async fn start_server<F>(config: &ServerConfig, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state, config);
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Prompt gateway listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("Prompt gateway stopped");
    Ok(())
}
