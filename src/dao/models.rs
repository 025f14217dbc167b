use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::SystemTime};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of a room as persisted in the `rooms` table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Created by the owner, no guest yet.
    Waiting,
    /// A guest joined; the game can start.
    Ready,
    /// Questions are being drawn and answered.
    Playing,
    /// A party lost its connection; waiting for it to come back.
    Paused,
    /// Terminal state.
    Finished,
}

impl RoomStatus {
    /// Column value used in store filters.
    pub fn as_str(self) -> &'static str {
        match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::Ready => "ready",
            RoomStatus::Playing => "playing",
            RoomStatus::Paused => "paused",
            RoomStatus::Finished => "finished",
        }
    }
}

/// One game instance between an owner and an optional guest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Primary key of the room.
    pub id: Uuid,
    /// Player who created the room.
    pub owner_id: Uuid,
    /// Player who joined the room, if any.
    #[serde(default)]
    pub guest_id: Option<Uuid>,
    /// Lifecycle position of the room.
    pub status: RoomStatus,
    /// Language code questions are drawn in (e.g. `en`).
    pub language: String,
    /// Categories questions are drawn from; empty means every category.
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
    /// Number of questions after which no fresh draw is allowed (0 = unlimited).
    pub max_questions: u32,
    /// Number of questions drawn so far; only ever increases.
    pub current_question_index: u32,
    /// Question drawn and not yet rotated out by a turn change.
    #[serde(default)]
    pub current_question_id: Option<Uuid>,
    /// Party expected to act.
    #[serde(default)]
    pub current_turn: Option<Uuid>,
    /// When the room entered the paused state.
    #[serde(default)]
    pub paused_at: Option<SystemTime>,
    /// Party whose connection loss paused the room.
    #[serde(default)]
    pub disconnected_party: Option<Uuid>,
    /// When the room was created.
    pub created_at: SystemTime,
    /// Last write to the room.
    pub updated_at: SystemTime,
}

/// Immutable question content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Question identifier.
    pub id: Uuid,
    /// Category the question belongs to.
    pub category_id: Uuid,
    /// Language code of the text.
    pub language: String,
    /// Question text shown to players.
    pub text: String,
}

/// Append-only fact that a question was drawn in a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionHistoryEntity {
    /// Entry identifier.
    pub id: Uuid,
    /// Room the question was drawn in.
    pub room_id: Uuid,
    /// Drawn question.
    pub question_id: Uuid,
    /// When the draw was recorded.
    pub created_at: SystemTime,
}

/// How a player reacted to a drawn question.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnswerAction {
    /// The player answered with a text body.
    Answered,
    /// The player skipped the question.
    Passed,
}

/// Raised when an action kind is neither `answered` nor `passed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown answer action `{0}` (expected `answered` or `passed`)")]
pub struct UnknownAnswerAction(pub String);

impl FromStr for AnswerAction {
    type Err = UnknownAnswerAction;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "answered" => Ok(AnswerAction::Answered),
            "passed" => Ok(AnswerAction::Passed),
            other => Err(UnknownAnswerAction(other.to_owned())),
        }
    }
}

/// One player's response to one drawn question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerEntity {
    /// Answer identifier.
    pub id: Uuid,
    /// Room the answer belongs to.
    pub room_id: Uuid,
    /// Question being answered.
    pub question_id: Uuid,
    /// Player who answered.
    pub user_id: Uuid,
    /// Free-text answer; empty for passed questions.
    pub body: String,
    /// Whether the player answered or passed.
    pub action: AnswerAction,
    /// When the answer was recorded.
    pub created_at: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_action_parses_known_kinds_only() {
        assert_eq!("answered".parse(), Ok(AnswerAction::Answered));
        assert_eq!(" passed ".parse(), Ok(AnswerAction::Passed));
        assert_eq!(
            "skipped".parse::<AnswerAction>(),
            Err(UnknownAnswerAction("skipped".into()))
        );
    }

    #[test]
    fn status_column_values_match_serde_names() {
        for status in [
            RoomStatus::Waiting,
            RoomStatus::Ready,
            RoomStatus::Playing,
            RoomStatus::Paused,
            RoomStatus::Finished,
        ] {
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::Value::String(status.as_str().into())
            );
        }
    }
}
