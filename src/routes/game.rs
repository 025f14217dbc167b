use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{
        AnswerListResponse, AnswerSummary, ChangeTurnRequest, CreateQuestionRequest,
        CreateRoomRequest, DrawResponse, JoinRoomRequest, PauseRequest, QuestionSummary,
        RoomSummary, StartGameResponse, StateChangeResponse, SubmitAnswerRequest,
        TimeoutCheckRequest, TimeoutCheckResponse,
    },
    error::AppError,
    services::game_service::RoomView,
    state::SharedState,
};

/// Routes driving rooms through their lifecycle, plus catalog seeding.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{id}", get(get_room))
        .route("/rooms/{id}/join", post(join_room))
        .route("/rooms/{id}/start", post(start_game))
        .route("/rooms/{id}/draw", post(draw_question))
        .route("/rooms/{id}/answers", get(list_answers).post(submit_answer))
        .route("/rooms/{id}/turn", post(change_turn))
        .route("/rooms/{id}/pause", post(pause_game))
        .route("/rooms/{id}/resume", post(resume_game))
        .route("/rooms/{id}/timeout-check", post(check_timeout))
        .route("/rooms/{id}/end", post(end_game))
        .route("/questions", post(create_question))
}

/// Open a room in `waiting` for its owner.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = RoomSummary),
        (status = 400, description = "Invalid payload")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateRoomRequest>>,
) -> Result<(StatusCode, Json<RoomSummary>), AppError> {
    let room = state
        .games()
        .create_room(
            payload.owner_id,
            &payload.language,
            payload.category_ids,
            payload.max_questions,
        )
        .await?;
    let summary: RoomSummary = RoomView {
        room,
        question: None,
    }
    .into();
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Current state of a room, including the in-flight question.
#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Room state", body = RoomSummary),
        (status = 404, description = "Unknown room")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoomSummary>, AppError> {
    let view = state.games().room(id).await?;
    Ok(Json(view.into()))
}

/// Attach the guest to a waiting room.
#[utoipa::path(
    post,
    path = "/rooms/{id}/join",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Guest attached", body = StateChangeResponse),
        (status = 409, description = "Room already has another guest")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<JoinRoomRequest>>,
) -> Result<Json<StateChangeResponse>, AppError> {
    let change = state.games().join_room(id, payload.guest_id).await?;
    Ok(Json(change.into()))
}

/// Start the game and draw its first question.
#[utoipa::path(
    post,
    path = "/rooms/{id}/start",
    tag = "game",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Game started", body = StartGameResponse),
        (status = 409, description = "Room already started or no question available")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StartGameResponse>, AppError> {
    let start = state.games().start_game(id).await?;
    Ok(Json(start.into()))
}

/// Draw a question, or return the one still in flight.
#[utoipa::path(
    post,
    path = "/rooms/{id}/draw",
    tag = "game",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Question on the table", body = DrawResponse),
        (status = 409, description = "Not playing, exhausted or limit reached")
    )
)]
pub async fn draw_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DrawResponse>, AppError> {
    let draw = state.games().draw_question(id).await?;
    Ok(Json(draw.into()))
}

/// Answer or pass the in-flight question.
#[utoipa::path(
    post,
    path = "/rooms/{id}/answers",
    tag = "game",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 201, description = "Answer recorded", body = AnswerSummary),
        (status = 400, description = "Unknown action or not a party of the room"),
        (status = 409, description = "No question drawn")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<SubmitAnswerRequest>>,
) -> Result<(StatusCode, Json<AnswerSummary>), AppError> {
    let answer = state
        .games()
        .submit_answer(id, payload.user_id, &payload.action, payload.body)
        .await?;
    Ok((StatusCode::CREATED, Json(answer.into())))
}

/// Answers of the room, oldest first.
#[utoipa::path(
    get,
    path = "/rooms/{id}/answers",
    tag = "game",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses((status = 200, description = "Recorded answers", body = AnswerListResponse))
)]
pub async fn list_answers(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnswerListResponse>, AppError> {
    let answers = state.games().list_answers(id).await?;
    Ok(Json(AnswerListResponse {
        count: answers.len(),
        answers: answers.into_iter().map(Into::into).collect(),
    }))
}

/// Pass the turn to the other party.
#[utoipa::path(
    post,
    path = "/rooms/{id}/turn",
    tag = "game",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = ChangeTurnRequest,
    responses((status = 200, description = "Turn changed or already changed", body = StateChangeResponse))
)]
pub async fn change_turn(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<ChangeTurnRequest>>,
) -> Result<Json<StateChangeResponse>, AppError> {
    let change = state.games().change_turn(id, payload.from).await?;
    Ok(Json(change.into()))
}

/// Report that a party lost its connection.
#[utoipa::path(
    post,
    path = "/rooms/{id}/pause",
    tag = "game",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = PauseRequest,
    responses((status = 200, description = "Paused, or no-op outside play", body = StateChangeResponse))
)]
pub async fn pause_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<PauseRequest>>,
) -> Result<Json<StateChangeResponse>, AppError> {
    let change = state
        .games()
        .pause_game(id, payload.disconnected_party)
        .await?;
    Ok(Json(change.into()))
}

/// Report that the disconnected party came back.
#[utoipa::path(
    post,
    path = "/rooms/{id}/resume",
    tag = "game",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses((status = 200, description = "Resumed, or no-op when not paused", body = StateChangeResponse))
)]
pub async fn resume_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StateChangeResponse>, AppError> {
    let change = state.games().resume_game(id).await?;
    Ok(Json(change.into()))
}

/// Finish the room if its pause outlasted the reconnection timeout.
#[utoipa::path(
    post,
    path = "/rooms/{id}/timeout-check",
    tag = "game",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = TimeoutCheckRequest,
    responses((status = 200, description = "Check outcome", body = TimeoutCheckResponse))
)]
pub async fn check_timeout(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<TimeoutCheckRequest>>,
) -> Result<Json<TimeoutCheckResponse>, AppError> {
    let limit = payload
        .limit_secs
        .map(Duration::from_secs)
        .unwrap_or(state.config().reconnection_timeout);
    let outcome = state
        .games()
        .check_reconnection_timeout(id, limit)
        .await?;
    Ok(Json(TimeoutCheckResponse {
        outcome,
        limit_secs: limit.as_secs(),
    }))
}

/// Finish the game.
#[utoipa::path(
    post,
    path = "/rooms/{id}/end",
    tag = "game",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses((status = 200, description = "Finished, or already finished", body = StateChangeResponse))
)]
pub async fn end_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StateChangeResponse>, AppError> {
    let change = state.games().end_game(id).await?;
    Ok(Json(change.into()))
}

/// Add a question to the catalog.
#[utoipa::path(
    post,
    path = "/questions",
    tag = "questions",
    request_body = CreateQuestionRequest,
    responses((status = 201, description = "Question added", body = QuestionSummary))
)]
pub async fn create_question(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateQuestionRequest>>,
) -> Result<(StatusCode, Json<QuestionSummary>), AppError> {
    let question = state
        .games()
        .catalog()
        .add_question(payload.category_id, payload.language, payload.text)
        .await?;
    Ok((StatusCode::CREATED, Json(question.into())))
}
