use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::state::AppState;

/// GET /api/events: SSE stream of session and step lifecycle events.
///
/// Each event is named after the message type and carries the message as
/// JSON. Lagged receivers skip what they missed; the page re-fetches state
/// on every event anyway.
pub async fn sse_events(
    State(app): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = app.event_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| {
        let msg = msg.ok()?;
        let data = serde_json::to_string(&msg).ok()?;
        Some(Ok::<Event, Infallible>(
            Event::default().event(msg.event_name()).data(data),
        ))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
