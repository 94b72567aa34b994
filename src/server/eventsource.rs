use axum::{
    extract::State,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};

use crate::notify::StoreChange;
use crate::server::AppState;

fn sse_event(change: &StoreChange) -> Result<SseEvent, axum::Error> {
    SseEvent::default()
        .event(change.target.kind())
        .id(change.id.to_string())
        .json_data(change)
}

/// `text/event-stream` of store changes. The subscription lives inside the
/// response stream, so a client disconnect unsubscribes it.
pub async fn event_source(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, axum::Error>>> {
    let subscription = state.hub.subscribe();
    tracing::debug!(listener = %subscription.id(), "event source connected");

    let stream = subscription.into_stream().map(|change| sse_event(&change));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::Event;
    use crate::notify::{ChangeTarget, NotificationHub};

    #[tokio::test]
    async fn test_changes_become_sse_events() {
        let hub = NotificationHub::default();
        let mut stream = Box::pin(hub.subscribe().into_stream().map(|change| sse_event(&change)));
        assert_eq!(hub.listener_count(), 1);

        hub.publish(
            ChangeTarget::Incident {
                event_id: Event::new("2025").unwrap(),
                incident_number: 7,
            },
            "summary",
            Some("Hubcap"),
        );
        assert!(stream.next().await.unwrap().is_ok());

        drop(stream);
        assert_eq!(hub.listener_count(), 0);
    }
}
