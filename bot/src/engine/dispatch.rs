use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span};

use super::cup_engine::CupEngine;
use super::events::InboundEvent;
use crate::platform::ChatPlatform;

/// Events waiting beyond this are refused at the relay endpoint.
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

fn event_kind(event: &InboundEvent) -> &'static str {
    match event {
        InboundEvent::Ready => "ready",
        InboundEvent::ReactionAdd(_) => "reaction_add",
        InboundEvent::ReactionRemove(_) => "reaction_remove",
        InboundEvent::MessageCreate(_) => "message_create",
    }
}

/// Drain the event queue one event at a time, so every reconciliation runs
/// to completion before the next one starts.
/// Returns when the sender side closes or the cancellation token fires.
pub async fn run_dispatcher<P: ChatPlatform>(
    engine: Arc<CupEngine<P>>,
    mut events: mpsc::Receiver<InboundEvent>,
    cancel: CancellationToken,
) {
    info!("event dispatcher started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("event dispatcher shutting down");
                break;
            }
            next = events.recv() => {
                let Some(event) = next else {
                    info!("event queue closed");
                    break;
                };
                let span = info_span!(
                    "event",
                    id = %uuid::Uuid::new_v4(),
                    kind = event_kind(&event),
                );
                async {
                    debug!("dispatching");
                    engine.handle_event(event).await;
                }
                .instrument(span)
                .await;
            }
        }
    }
}
