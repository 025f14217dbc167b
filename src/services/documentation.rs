use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Duo Cards Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::room_stream,
        crate::routes::sse::user_stream,
        crate::routes::game::create_room,
        crate::routes::game::get_room,
        crate::routes::game::join_room,
        crate::routes::game::start_game,
        crate::routes::game::draw_question,
        crate::routes::game::submit_answer,
        crate::routes::game::list_answers,
        crate::routes::game::change_turn,
        crate::routes::game::pause_game,
        crate::routes::game::resume_game,
        crate::routes::game::check_timeout,
        crate::routes::game::end_game,
        crate::routes::game::create_question,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::events::EventKind,
            crate::dto::events::GameStartedEvent,
            crate::dto::events::QuestionDrawnEvent,
            crate::dto::events::AnswerSubmittedEvent,
            crate::dto::events::TurnChangedEvent,
            crate::dto::events::GamePausedEvent,
            crate::dto::events::GameResumedEvent,
            crate::dto::events::GameFinishedEvent,
            crate::dto::events::FinishReason,
            crate::dto::events::NotificationEvent,
            crate::dao::models::RoomStatus,
            crate::dao::models::AnswerAction,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "rooms", description = "Room creation and lookup"),
        (name = "game", description = "Turn-based game operations"),
        (name = "questions", description = "Question catalog seeding"),
    )
)]
pub struct ApiDoc;
