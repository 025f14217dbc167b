use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Realtime event envelope and payloads.
pub mod events;
/// Game requests and responses.
pub mod game;
/// Health check response.
pub mod health;
/// Custom validators.
pub mod validation;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
