use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the record store and report the live subscription count.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let subscriptions = state.bus().subscriber_count();
    match state.store().health_check().await {
        Ok(()) => HealthResponse::ok(subscriptions),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded(subscriptions)
        }
    }
}
