//! SSE framing for reply streams.
//!
//! Each [`NormalizedEvent`] becomes one named event carrying JSON data.

use crate::normalized::{NormalizedEvent, event_name};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;

/// Render normalized events as named SSE events with JSON data.
pub fn build_sse_response<S>(stream: S) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send>
where
    S: Stream<Item = NormalizedEvent> + Send + 'static,
{
    let stream = stream.map(|event| {
        let data = match &event {
            NormalizedEvent::StreamStart { request_id } => {
                serde_json::json!({ "request_id": request_id })
            }
            NormalizedEvent::MessageDelta { text } => serde_json::json!({ "text": text }),
            NormalizedEvent::Error { message, code } => {
                serde_json::json!({ "message": message, "code": code })
            }
            NormalizedEvent::Done => serde_json::json!({}),
        };

        Ok(Event::default().event(event_name(&event)).data(data.to_string()))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
