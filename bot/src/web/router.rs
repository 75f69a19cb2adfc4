use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::app_state::AppState;
use super::relay;
use crate::platform::ChatPlatform;

/// Gateway events are small; anything bigger is not from the relay.
const MAX_EVENT_BODY: usize = 64 * 1024;

/// Build the axum router for the relay endpoints.
pub fn build_router<P: ChatPlatform>(state: Arc<AppState<P>>) -> Router {
    let relay_routes = Router::new()
        .route("/events", post(relay::receive_event::<P>))
        .layer(RequestBodyLimitLayer::new(MAX_EVENT_BODY));

    Router::new()
        .merge(relay_routes)
        .route("/health", get(relay::health))
        .route("/roster", get(relay::roster::<P>))
        .route("/presence", get(relay::presence::<P>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
