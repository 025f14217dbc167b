use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use uuid::Uuid;

use crate::{dto::game::StreamQuery, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/rooms/{id}",
    tag = "sse",
    params(
        ("id" = Uuid, Path, description = "Room to follow"),
        StreamQuery
    ),
    responses((status = 200, description = "Room events plus the user's notifications", content_type = "text/event-stream", body = String))
)]
/// Stream a room's events to one of its players.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    sse_service::open_stream(state.bus(), Some(room_id), query.user_id)
}

#[utoipa::path(
    get,
    path = "/sse/users/{id}",
    tag = "sse",
    params(("id" = Uuid, Path, description = "User to notify")),
    responses((status = 200, description = "User-addressed events", content_type = "text/event-stream", body = String))
)]
/// Stream notifications and badge updates addressed to one user.
pub async fn user_stream(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    sse_service::open_stream(state.bus(), None, user_id)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/rooms/{id}", get(room_stream))
        .route("/sse/users/{id}", get(user_stream))
}
