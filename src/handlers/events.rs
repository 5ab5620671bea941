use super::AppState;
use crate::store::PollEvent;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::Stream;
use log::{error, warn};
use serde_json::json;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;

/// Server-sent stream of poll changes, so clients can stop re-fetching on a timer.
pub async fn poll_events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut events = state.store.subscribe();

    let stream = async_stream::stream! {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(sse) = to_sse(&event) {
                        yield Ok(sse);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, {} poll events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse(event: &PollEvent) -> Option<Event> {
    let (name, data) = match event {
        PollEvent::Created(poll) => ("created", json!({ "poll": poll })),
        PollEvent::Updated(poll) => ("updated", json!({ "poll": poll })),
        PollEvent::Deleted { poll_id } => ("deleted", json!({ "pollId": poll_id })),
    };

    Event::default()
        .event(name)
        .json_data(data)
        .inspect_err(|e| error!("Failed to encode {} event: {}", name, e))
        .ok()
}
