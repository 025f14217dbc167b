use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Live event subscriptions held by this process.
    pub subscriptions: usize,
}

impl HealthResponse {
    /// The record store answered its health check.
    pub fn ok(subscriptions: usize) -> Self {
        Self {
            status: "ok".to_string(),
            subscriptions,
        }
    }

    /// The record store could not be reached.
    pub fn degraded(subscriptions: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            subscriptions,
        }
    }
}
