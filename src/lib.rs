//! Library crate for duo-cards-back, exposing modules for binaries and integration tests.

/// Application configuration.
pub mod config;
/// Data access layer.
pub mod dao;
/// Wire types.
pub mod dto;
/// Service and HTTP errors.
pub mod error;
/// HTTP routes.
pub mod routes;
/// Business services.
pub mod services;
/// Shared state and game rules.
pub mod state;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::SharedState;

/// Build the top-level router and attach cross-cutting middleware layers.
pub fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
