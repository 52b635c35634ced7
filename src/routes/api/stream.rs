use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

use crate::routes::AppState;

/// Server-sent projection of the in-process event bus. When a client stops
/// reading, its queue fills and the bus quarantines it on the next emit.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, rx) = state.bus.subscribe();
    tracing::info!(subscriber = %id, "sse client connected");

    let stream = ReceiverStream::new(rx).map(|bus_event| {
        let event = Event::default().event(bus_event.topic.as_str());
        Ok(match event.json_data(&bus_event.payload) {
            Ok(event) => event,
            Err(_) => Event::default()
                .event(bus_event.topic.as_str())
                .data("{}"),
        })
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(25))
            .text("heartbeat"),
    )
}
