use std::time::SystemTime;

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dao::models::AnswerAction, dto::format_system_time};

/// Type tag of a realtime event.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The room started playing.
    GameStarted,
    /// A fresh question was committed.
    QuestionDrawn,
    /// A player answered or passed.
    AnswerSubmitted,
    /// The turn passed to the other party.
    TurnChanged,
    /// A disconnection paused the room.
    GamePaused,
    /// The disconnected party came back.
    GameResumed,
    /// The room reached its terminal status.
    GameFinished,
    /// User-addressed message (e.g. "your turn").
    Notification,
    /// User-addressed unread counter refresh, published by the social layer over the same bus.
    BadgeUpdate,
}

impl EventKind {
    /// Wire name, also used as the SSE `event:` field.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::GameStarted => "game_started",
            EventKind::QuestionDrawn => "question_drawn",
            EventKind::AnswerSubmitted => "answer_submitted",
            EventKind::TurnChanged => "turn_changed",
            EventKind::GamePaused => "game_paused",
            EventKind::GameResumed => "game_resumed",
            EventKind::GameFinished => "game_finished",
            EventKind::Notification => "notification",
            EventKind::BadgeUpdate => "badge_update",
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
/// Ephemeral message carried by the event bus, serialised as `{type, data}`.
pub struct RealtimeEvent {
    /// Event type, serialised as `type`.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Type-specific payload.
    pub data: Value,
}

impl RealtimeEvent {
    /// Event with an already built payload.
    pub fn new(kind: EventKind, data: Value) -> Self {
        Self { kind, data }
    }

    /// Convenience wrapper that serialises `payload` into the data field.
    pub fn json<T: Serialize>(kind: EventKind, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            kind,
            data: serde_json::to_value(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a room starts playing.
pub struct GameStartedEvent {
    /// Room that started.
    pub room_id: Uuid,
    /// Party playing first.
    pub current_turn: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a fresh question has been drawn.
pub struct QuestionDrawnEvent {
    /// Room the question was drawn in.
    pub room_id: Uuid,
    /// Drawn question.
    pub question_id: Uuid,
    /// Category of the drawn question.
    pub category_id: Uuid,
    /// Question text to display.
    pub text: String,
    /// 1-based position of the question in the game.
    pub index: u32,
    /// Party expected to answer.
    pub current_turn: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player answered or passed.
pub struct AnswerSubmittedEvent {
    /// Room the answer belongs to.
    pub room_id: Uuid,
    /// Stored answer.
    pub answer_id: Uuid,
    /// Question that was answered or passed.
    pub question_id: Uuid,
    /// Player who reacted.
    pub user_id: Uuid,
    /// Whether the player answered or passed.
    pub action: AnswerAction,
    /// Answer text; empty for passed questions.
    pub body: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the turn passes to the other party.
pub struct TurnChangedEvent {
    /// Room whose turn changed.
    pub room_id: Uuid,
    /// Party now holding the turn.
    pub current_turn: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a disconnection paused the room.
pub struct GamePausedEvent {
    /// Paused room.
    pub room_id: Uuid,
    /// Party whose connection dropped.
    pub disconnected_party: Uuid,
    /// RFC 3339 timestamp of the pause.
    pub paused_at: String,
}

impl GamePausedEvent {
    /// Payload for a pause that began at `paused_at`.
    pub fn new(room_id: Uuid, disconnected_party: Uuid, paused_at: SystemTime) -> Self {
        Self {
            room_id,
            disconnected_party,
            paused_at: format_system_time(paused_at),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the disconnected party came back.
pub struct GameResumedEvent {
    /// Resumed room.
    pub room_id: Uuid,
}

/// Why a room reached its terminal status.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// A caller ended the game.
    Ended,
    /// The disconnected party did not come back in time.
    ReconnectionTimeout,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the room is finished.
pub struct GameFinishedEvent {
    /// Finished room.
    pub room_id: Uuid,
    /// Why the game ended.
    pub reason: FinishReason,
    /// Number of questions drawn over the game.
    pub questions_drawn: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Sent to a single user.
pub struct NotificationEvent {
    /// Room the message is about, if any.
    pub room_id: Option<Uuid>,
    /// Human-readable text.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn events_serialise_as_type_and_data() {
        let room_id = Uuid::nil();
        let event = RealtimeEvent::json(
            EventKind::GameResumed,
            &GameResumedEvent { room_id },
        )
        .unwrap();

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "game_resumed", "data": { "room_id": room_id } })
        );
    }

    #[test]
    fn wire_names_match_serde_names() {
        for kind in [
            EventKind::GameStarted,
            EventKind::QuestionDrawn,
            EventKind::AnswerSubmitted,
            EventKind::TurnChanged,
            EventKind::GamePaused,
            EventKind::GameResumed,
            EventKind::GameFinished,
            EventKind::Notification,
            EventKind::BadgeUpdate,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
        }
    }
}
