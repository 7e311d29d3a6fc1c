//! SSE event stream endpoint

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::state::AppState;

/// GET /api/v1/events
///
/// Streams every WeaveEvent to the client as it is emitted.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    weave_common::sse::create_event_sse_stream("weave-rd", &state.event_bus)
}
