use serde::Serialize;
use tracing::{Span, debug, warn};
use uuid::Uuid;

use crate::{
    dao::models::{AnswerEntity, QuestionEntity, RoomEntity},
    dto::events::{
        AnswerSubmittedEvent, EventKind, FinishReason, GameFinishedEvent, GamePausedEvent,
        GameResumedEvent, GameStartedEvent, QuestionDrawnEvent, RealtimeEvent, TurnChangedEvent,
    },
    state::event_bus::{Delivery, EventBus},
};

/// Broadcast that the room started playing.
pub fn broadcast_game_started(bus: &EventBus, span: &Span, room: &RoomEntity) {
    let payload = GameStartedEvent {
        room_id: room.id,
        current_turn: room.current_turn.unwrap_or(room.owner_id),
    };
    send_room_event(bus, span, room.id, EventKind::GameStarted, &payload);
}

/// Broadcast a freshly drawn question.
pub fn broadcast_question_drawn(
    bus: &EventBus,
    span: &Span,
    room: &RoomEntity,
    question: &QuestionEntity,
) {
    let payload = QuestionDrawnEvent {
        room_id: room.id,
        question_id: question.id,
        category_id: question.category_id,
        text: question.text.clone(),
        index: room.current_question_index,
        current_turn: room.current_turn,
    };
    send_room_event(bus, span, room.id, EventKind::QuestionDrawn, &payload);
}

/// Broadcast a recorded answer.
pub fn broadcast_answer_submitted(bus: &EventBus, span: &Span, answer: &AnswerEntity) {
    let payload = AnswerSubmittedEvent {
        room_id: answer.room_id,
        answer_id: answer.id,
        question_id: answer.question_id,
        user_id: answer.user_id,
        action: answer.action,
        body: answer.body.clone(),
    };
    send_room_event(bus, span, answer.room_id, EventKind::AnswerSubmitted, &payload);
}

/// Broadcast the new turn holder.
pub fn broadcast_turn_changed(bus: &EventBus, span: &Span, room_id: Uuid, current_turn: Uuid) {
    let payload = TurnChangedEvent {
        room_id,
        current_turn,
    };
    send_room_event(bus, span, room_id, EventKind::TurnChanged, &payload);
}

/// Broadcast that a disconnection paused the room.
pub fn broadcast_game_paused(bus: &EventBus, span: &Span, room: &RoomEntity) {
    let (Some(party), Some(paused_at)) = (room.disconnected_party, room.paused_at) else {
        warn!(parent: span, room_id = %room.id, "paused room lacks pause bookkeeping; event skipped");
        return;
    };
    let payload = GamePausedEvent::new(room.id, party, paused_at);
    send_room_event(bus, span, room.id, EventKind::GamePaused, &payload);
}

/// Broadcast that a paused room resumed.
pub fn broadcast_game_resumed(bus: &EventBus, span: &Span, room_id: Uuid) {
    let payload = GameResumedEvent { room_id };
    send_room_event(bus, span, room_id, EventKind::GameResumed, &payload);
}

/// Broadcast the terminal status of the room together with why it ended.
pub fn broadcast_game_finished(
    bus: &EventBus,
    span: &Span,
    room: &RoomEntity,
    reason: FinishReason,
) {
    let payload = GameFinishedEvent {
        room_id: room.id,
        reason,
        questions_drawn: room.current_question_index,
    };
    send_room_event(bus, span, room.id, EventKind::GameFinished, &payload);
}

fn send_room_event(
    bus: &EventBus,
    span: &Span,
    room_id: Uuid,
    kind: EventKind,
    payload: &impl Serialize,
) {
    match RealtimeEvent::json(kind, payload) {
        Ok(event) => {
            let delivery = bus.publish_to_room(room_id, &event);
            log_delivery(span, kind, delivery);
        }
        Err(err) => warn!(
            parent: span,
            event = kind.as_str(),
            error = %err,
            "failed to serialize room event payload"
        ),
    }
}

/// Serialise `payload` and queue it for every subscription held by `user_id`.
pub(crate) fn send_user_event(
    bus: &EventBus,
    span: &Span,
    user_id: Uuid,
    kind: EventKind,
    payload: &impl Serialize,
) -> Delivery {
    match RealtimeEvent::json(kind, payload) {
        Ok(event) => {
            let delivery = bus.publish_to_user(user_id, &event);
            log_delivery(span, kind, delivery);
            delivery
        }
        Err(err) => {
            warn!(
                parent: span,
                event = kind.as_str(),
                error = %err,
                "failed to serialize user event payload"
            );
            Delivery::default()
        }
    }
}

fn log_delivery(span: &Span, kind: EventKind, delivery: Delivery) {
    debug!(
        parent: span,
        event = kind.as_str(),
        delivered = delivery.delivered,
        dropped = delivery.dropped,
        "event published"
    );
}
