//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE helpers for Weave services.

use crate::events::EventBus;
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info};

/// Create an SSE stream that forwards EventBus events to the client
///
/// Each event is serialized as JSON with its `type` tag as the SSE event
/// name. A heartbeat comment is sent every 15 seconds so proxies keep the
/// connection open.
pub fn create_event_sse_stream(
    service_name: &'static str,
    event_bus: &EventBus,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);

    let mut rx = event_bus.subscribe();

    let stream = async_stream::stream! {
        // Initial connected status so clients can show connection state
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            tokio::select! {
                received = rx.recv() => {
                    match received {
                        Ok(event) => {
                            let name = event_name(&event);
                            match serde_json::to_string(&event) {
                                Ok(json) => yield Ok(Event::default().event(name).data(json)),
                                Err(e) => debug!("SSE: failed to serialize event: {}", e),
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!("SSE: subscriber lagged, skipped {} events", skipped);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    yield Ok(Event::default().comment("heartbeat"));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}

fn event_name(event: &crate::events::WeaveEvent) -> &'static str {
    use crate::events::WeaveEvent::*;
    match event {
        RankingComputed { .. } => "RankingComputed",
        RosterFetched { .. } => "RosterFetched",
        ReconcileCompleted { .. } => "ReconcileCompleted",
        RelationshipStatusChanged { .. } => "RelationshipStatusChanged",
        RelationshipAdded { .. } => "RelationshipAdded",
        RelationshipRemoved { .. } => "RelationshipRemoved",
    }
}
