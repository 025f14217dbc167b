/// OpenAPI documentation generation.
pub mod documentation;
/// Game session orchestrator.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Fire-and-forget user notifications.
pub mod notifications;
/// Question draws without repetition.
pub mod question_catalog;
/// Typed realtime event publication.
pub mod realtime_events;
/// Background finishing of rooms whose disconnected party never came back.
pub mod reconnection_sweeper;
/// Server-Sent Events bridge over event bus subscriptions.
pub mod sse_service;
