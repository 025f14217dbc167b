use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::events::RealtimeEvent,
    state::event_bus::{EventBus, Subscription},
};

/// Open a bus subscription and expose it as an SSE response.
///
/// With `room_id` the stream carries the room's events plus everything addressed to
/// `user_id`; without it only user-addressed events are delivered.
pub fn open_stream(
    bus: &EventBus,
    room_id: Option<Uuid>,
    user_id: Uuid,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + use<>> {
    let subscription = bus.subscribe(room_id, user_id);
    info!(
        subscription_id = %subscription.id(),
        ?room_id,
        %user_id,
        "new SSE connection"
    );
    to_sse_stream(bus.clone(), subscription)
}

/// Forward a subscription into an SSE response and unsubscribe once the client disconnects.
fn to_sse_stream(
    bus: EventBus,
    mut subscription: Subscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + use<>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                next = subscription.recv() => {
                    let Some(event) = next else { break };
                    match to_sse_event(&event) {
                        Ok(sse_event) => {
                            if tx.send(Ok(sse_event)).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => warn!(
                            event = event.kind.as_str(),
                            error = %err,
                            "failed to encode SSE event"
                        ),
                    }
                }
            }
        }

        bus.unsubscribe(subscription.id());
        info!(subscription_id = %subscription.id(), "SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Encode an event with its type as the SSE event name and the `{type, data}` envelope as data.
fn to_sse_event(event: &RealtimeEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.kind.as_str()).json_data(event)
}
