use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use super::app_state::AppState;
use crate::engine::effects::Activity;
use crate::engine::events::InboundEvent;
use crate::platform::ChatPlatform;

pub const RELAY_TOKEN_HEADER: &str = "x-relay-token";

fn authorized<P>(state: &AppState<P>, headers: &HeaderMap) -> bool {
    headers
        .get(RELAY_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|token| !state.relay_token.is_empty() && token == state.relay_token)
}

/// POST /events: queue one gateway event for the dispatcher.
pub async fn receive_event<P: ChatPlatform>(
    State(state): State<Arc<AppState<P>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !authorized(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, "Invalid relay token").into_response();
    }

    let event: InboundEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "malformed relay event");
            return (StatusCode::BAD_REQUEST, "Malformed event").into_response();
        }
    };

    match state.events.try_send(event) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(TrySendError::Full(_)) => {
            warn!("event queue full, refusing relay event");
            (StatusCode::SERVICE_UNAVAILABLE, "Event queue full").into_response()
        }
        Err(TrySendError::Closed(_)) => {
            (StatusCode::SERVICE_UNAVAILABLE, "Shutting down").into_response()
        }
    }
}

pub async fn health() -> &'static str {
    "ok"
}

/// GET /roster: current roster as JSON.
pub async fn roster<P: ChatPlatform>(State(state): State<Arc<AppState<P>>>) -> impl IntoResponse {
    Json(state.engine.roster())
}

#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub status: &'static str,
    /// `streaming` when a URL is attached, otherwise `playing`.
    pub activity_type: &'static str,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// GET /presence: the activity the relay should show on the gateway.
pub async fn presence<P: ChatPlatform>(
    State(state): State<Arc<AppState<P>>>,
) -> Json<PresenceResponse> {
    let activity = state.presence.borrow().clone();
    let idle = &state.presence_config;
    let response = match activity {
        Activity::Idle => PresenceResponse {
            status: "idle",
            activity_type: if idle.idle_url.is_some() { "streaming" } else { "playing" },
            name: activity.status_text(&idle.idle_name),
            url: idle.idle_url.clone(),
        },
        Activity::Team { .. } => PresenceResponse {
            status: "online",
            activity_type: "playing",
            name: activity.status_text(&idle.idle_name),
            url: None,
        },
    };
    Json(response)
}
