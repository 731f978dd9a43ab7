//! Platform adapter endpoint: POST /events
//!
//! The adapter forwards every message it sees in a bot conversation and
//! executes the returned actions in order.
//!
//! Auth: `Authorization: Bearer <token>` when `gateway.token` is set.
//!
//! Request:  an `InboundEvent` as JSON
//! Response: `{"conversation_id": "...", "stale": false, "actions": [...]}`
//! Error:    `{"error": "...", "code": "..."}`

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chatgate_channels::{ChannelError, InboundEvent};
use chatgate_core::ChatgateError;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::app::AppState;
use crate::pipeline::EventReply;

#[derive(Debug, Serialize)]
pub struct EventError {
    pub error: String,
    pub code: &'static str,
}

impl From<ChannelError> for EventError {
    fn from(e: ChannelError) -> Self {
        let error = e.to_string();
        Self {
            error,
            code: ChatgateError::from(e).code(),
        }
    }
}

/// POST /events: run one inbound message through the pipeline.
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(event): Json<InboundEvent>,
) -> Result<Json<EventReply>, (StatusCode, Json<EventError>)> {
    if !check_auth(&state, &headers) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(EventError::from(ChannelError::Unauthorized)),
        ));
    }

    match state.pipeline.handle(event).await {
        Ok(reply) => Ok(Json(reply)),
        Err(e) => {
            warn!(error = %e, "POST /events rejected");
            Err((StatusCode::BAD_REQUEST, Json(EventError::from(e))))
        }
    }
}

/// Returns true if the request is authorised.
fn check_auth(state: &AppState, headers: &HeaderMap) -> bool {
    match state.config.gateway.token.as_deref() {
        None => true,
        Some(expected) => extract_bearer(headers)
            .map(|t| t == expected)
            .unwrap_or(false),
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
