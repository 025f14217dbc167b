//! User-addressed notifications delivered outside the request that triggered them.
//!
//! Every send is submitted as its own Tokio task and may complete after the caller returned.
//! Callers that care about the outcome can await the returned handle; everyone else drops it.

use tokio::task::JoinHandle;
use tracing::Span;
use uuid::Uuid;

use crate::{
    dto::events::{EventKind, NotificationEvent},
    services::realtime_events::send_user_event,
    state::event_bus::{Delivery, EventBus},
};

/// Message sent to the party that now holds the turn.
pub const YOUR_TURN_MESSAGE: &str = "It's your turn";
/// Message sent to the owner once a guest attached to the room.
pub const GUEST_JOINED_MESSAGE: &str = "A guest joined your room";

/// Fire-and-forget sender of `notification` events.
#[derive(Clone)]
pub struct Notifier {
    bus: EventBus,
    span: Span,
}

impl Notifier {
    /// Notifier logging inside `span`.
    pub fn new(bus: EventBus, span: Span) -> Self {
        Self { bus, span }
    }

    /// Queue a `notification` for every subscription held by `user_id`.
    pub fn notify(
        &self,
        user_id: Uuid,
        room_id: Option<Uuid>,
        message: impl Into<String>,
    ) -> JoinHandle<Delivery> {
        let payload = NotificationEvent {
            room_id,
            message: message.into(),
        };
        let bus = self.bus.clone();
        let span = self.span.clone();
        tokio::spawn(async move {
            send_user_event(&bus, &span, user_id, EventKind::Notification, &payload)
        })
    }
}
