use axum::Router;

use crate::state::SharedState;

/// OpenAPI and Swagger UI.
pub mod docs;
/// Game endpoints.
pub mod game;
/// Health endpoint.
pub mod health;
/// Server-Sent Events endpoints.
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(game::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
