use axum::{
    routing::{get, post},
    Router,
};
use chatgate_core::ChatgateConfig;
use std::sync::Arc;

use crate::pipeline::Pipeline;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: ChatgateConfig,
    pub pipeline: Pipeline,
}

impl AppState {
    pub fn new(config: ChatgateConfig, pipeline: Pipeline) -> Self {
        Self { config, pipeline }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/events", post(crate::http::events::events_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
