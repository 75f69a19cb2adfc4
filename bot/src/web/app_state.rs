use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::config::PresenceSection;
use crate::engine::cup_engine::CupEngine;
use crate::engine::effects::Activity;
use crate::engine::events::InboundEvent;

/// Shared state for the relay endpoints.
pub struct AppState<P> {
    pub engine: Arc<CupEngine<P>>,
    /// Queue consumed by the dispatcher task.
    pub events: mpsc::Sender<InboundEvent>,
    /// Expected value of the `x-relay-token` header.
    pub relay_token: String,
    pub presence: watch::Receiver<Activity>,
    pub presence_config: PresenceSection,
}
