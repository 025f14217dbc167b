use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{AnswerAction, AnswerEntity, QuestionEntity, RoomStatus},
    dto::{format_system_time, validation::validate_language},
    services::game_service::{Draw, GameStart, ReconnectionCheck, RoomView, StateChange},
};

/// Longest free-text answer accepted.
pub const MAX_ANSWER_LENGTH: u64 = 2000;

/// Payload used to open a new room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    /// Player creating the room.
    pub owner_id: Uuid,
    /// Language code questions are drawn in.
    #[validate(custom(function = "validate_language"))]
    pub language: String,
    /// Categories to draw from; empty means every category of the language.
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
    /// Questions after which no new draw is allowed; 0 means unlimited.
    #[serde(default)]
    #[validate(range(max = 1000))]
    pub max_questions: u32,
}

/// Guest attaching to a waiting room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRoomRequest {
    /// Player joining the room.
    pub guest_id: Uuid,
}

/// A player's reaction to the in-flight question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitAnswerRequest {
    /// Player answering.
    pub user_id: Uuid,
    /// `answered` or `passed`.
    #[validate(length(min = 1, max = 32))]
    pub action: String,
    /// Ignored for passed questions.
    #[serde(default)]
    #[validate(length(max = MAX_ANSWER_LENGTH))]
    pub body: String,
}

/// Optional guard making turn changes safe to retry.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct ChangeTurnRequest {
    /// Party expected to hold the turn; the change is skipped when someone else holds it.
    #[serde(default)]
    pub from: Option<Uuid>,
}

/// Connection loss reported for a playing room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PauseRequest {
    /// Party whose connection dropped.
    pub disconnected_party: Uuid,
}

/// Explicit reconnection timeout check.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct TimeoutCheckRequest {
    /// Overrides the configured reconnection timeout.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub limit_secs: Option<u64>,
}

/// Question added to the catalog.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateQuestionRequest {
    /// Category the question belongs to.
    pub category_id: Uuid,
    /// Language code of the text.
    #[validate(custom(function = "validate_language"))]
    pub language: String,
    /// Question text.
    #[validate(length(min = 1, max = 500))]
    pub text: String,
}

/// User id identifying the SSE subscriber.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StreamQuery {
    /// Subscribing player.
    pub user_id: Uuid,
}

/// Question as exposed to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionSummary {
    /// Question identifier.
    pub id: Uuid,
    /// Category the question belongs to.
    pub category_id: Uuid,
    /// Language code of the text.
    pub language: String,
    /// Question text.
    pub text: String,
}

/// Room state as exposed to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomSummary {
    /// Room identifier.
    pub id: Uuid,
    /// Player who created the room.
    pub owner_id: Uuid,
    /// Player who joined, if any.
    pub guest_id: Option<Uuid>,
    /// Lifecycle status.
    pub status: RoomStatus,
    /// Language code questions are drawn in.
    pub language: String,
    /// Categories questions are drawn from.
    pub category_ids: Vec<Uuid>,
    /// Question limit; 0 means unlimited.
    pub max_questions: u32,
    /// Questions drawn so far.
    pub current_question_index: u32,
    /// In-flight question, when resolved.
    pub current_question: Option<QuestionSummary>,
    /// Party expected to act.
    pub current_turn: Option<Uuid>,
    /// RFC 3339 time the room was paused.
    pub paused_at: Option<String>,
    /// Party whose connection loss paused the room.
    pub disconnected_party: Option<Uuid>,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 time of the last write.
    pub updated_at: String,
}

/// Result of a draw.
#[derive(Debug, Serialize, ToSchema)]
pub struct DrawResponse {
    /// Drawn or in-flight question.
    pub question: QuestionSummary,
    /// Position of the question in the game, starting at 1.
    pub index: u32,
    /// `false` when the in-flight question was returned.
    pub fresh: bool,
}

/// Started room with its first question.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartGameResponse {
    /// Room after the start.
    pub room: RoomSummary,
    /// First draw.
    pub draw: DrawResponse,
}

/// `room.current_question` is left empty; fetch the room for the in-flight question text.
#[derive(Debug, Serialize, ToSchema)]
pub struct StateChangeResponse {
    /// `false` when the request was an idempotent no-op.
    pub applied: bool,
    /// Room after the request.
    pub room: RoomSummary,
}

/// Recorded answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnswerSummary {
    /// Answer identifier.
    pub id: Uuid,
    /// Question answered.
    pub question_id: Uuid,
    /// Player who answered.
    pub user_id: Uuid,
    /// Answered or passed.
    pub action: AnswerAction,
    /// Answer text; empty when passed.
    pub body: String,
    /// RFC 3339 creation time.
    pub created_at: String,
}

/// Answers of a room, oldest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnswerListResponse {
    /// Number of answers.
    pub count: usize,
    /// The answers.
    pub answers: Vec<AnswerSummary>,
}

/// Outcome of a reconnection timeout check.
#[derive(Debug, Serialize, ToSchema)]
pub struct TimeoutCheckResponse {
    /// What the check found.
    pub outcome: ReconnectionCheck,
    /// Timeout the check applied, in seconds.
    pub limit_secs: u64,
}

impl From<QuestionEntity> for QuestionSummary {
    fn from(question: QuestionEntity) -> Self {
        Self {
            id: question.id,
            category_id: question.category_id,
            language: question.language,
            text: question.text,
        }
    }
}

impl From<RoomView> for RoomSummary {
    fn from(view: RoomView) -> Self {
        let RoomView { room, question } = view;
        Self {
            id: room.id,
            owner_id: room.owner_id,
            guest_id: room.guest_id,
            status: room.status,
            language: room.language,
            category_ids: room.category_ids,
            max_questions: room.max_questions,
            current_question_index: room.current_question_index,
            current_question: question.map(Into::into),
            current_turn: room.current_turn,
            paused_at: room.paused_at.map(format_system_time),
            disconnected_party: room.disconnected_party,
            created_at: format_system_time(room.created_at),
            updated_at: format_system_time(room.updated_at),
        }
    }
}

impl From<Draw> for DrawResponse {
    fn from(draw: Draw) -> Self {
        Self {
            question: draw.question.into(),
            index: draw.index,
            fresh: draw.fresh,
        }
    }
}

impl From<GameStart> for StartGameResponse {
    fn from(start: GameStart) -> Self {
        let view = RoomView {
            room: start.room,
            question: Some(start.draw.question.clone()),
        };
        Self {
            room: view.into(),
            draw: start.draw.into(),
        }
    }
}

impl From<StateChange> for StateChangeResponse {
    fn from(change: StateChange) -> Self {
        Self {
            applied: change.applied,
            room: RoomView {
                room: change.room,
                question: None,
            }
            .into(),
        }
    }
}

impl From<AnswerEntity> for AnswerSummary {
    fn from(answer: AnswerEntity) -> Self {
        Self {
            id: answer.id,
            question_id: answer.question_id,
            user_id: answer.user_id,
            action: answer.action,
            body: answer.body,
            created_at: format_system_time(answer.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn create_room_request_validates_language_and_limit() {
        let valid: CreateRoomRequest = serde_json::from_value(json!({
            "owner_id": Uuid::new_v4(),
            "language": "en",
        }))
        .unwrap();
        assert!(valid.validate().is_ok());
        assert!(valid.category_ids.is_empty());
        assert_eq!(valid.max_questions, 0);

        let bad_language: CreateRoomRequest = serde_json::from_value(json!({
            "owner_id": Uuid::new_v4(),
            "language": "English",
        }))
        .unwrap();
        assert!(bad_language.validate().is_err());

        let too_many: CreateRoomRequest = serde_json::from_value(json!({
            "owner_id": Uuid::new_v4(),
            "language": "en",
            "max_questions": 5000,
        }))
        .unwrap();
        assert!(too_many.validate().is_err());
    }

    #[test]
    fn answer_body_is_bounded() {
        let request = SubmitAnswerRequest {
            user_id: Uuid::new_v4(),
            action: "answered".into(),
            body: "x".repeat(MAX_ANSWER_LENGTH as usize + 1),
        };
        assert!(request.validate().is_err());
    }
}
