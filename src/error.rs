use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::{models::UnknownAnswerAction, storage::StorageError},
    state::state_machine::InvalidTransition,
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The record store failed; the operation was aborted before publishing anything.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Every question matching the room's filter has already been drawn.
    #[error(
        "no questions left to draw for language `{language}` in {}",
        describe_categories(.categories)
    )]
    QuestionsExhausted {
        /// Room language.
        language: String,
        /// Room categories; empty means all of them.
        categories: Vec<Uuid>,
    },
    /// The room already drew as many questions as it allows.
    #[error("question limit of {max} reached")]
    QuestionLimitReached {
        /// Configured limit.
        max: u32,
    },
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

fn describe_categories(categories: &[Uuid]) -> String {
    if categories.is_empty() {
        return "any category".into();
    }
    let ids = categories
        .iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("categories [{ids}]")
}

impl ServiceError {
    pub(crate) fn room_not_found(id: Uuid) -> Self {
        ServiceError::NotFound(format!("room `{id}` not found"))
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<UnknownAnswerAction> for ServiceError {
    fn from(err: UnknownAnswerAction) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Storage(StorageError::Unavailable { message, .. }) => {
                AppError::ServiceUnavailable(message)
            }
            ServiceError::Storage(other) => AppError::Internal(other.to_string()),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            exhausted @ ServiceError::QuestionsExhausted { .. } => {
                AppError::Conflict(exhausted.to_string())
            }
            limit @ ServiceError::QuestionLimitReached { .. } => {
                AppError::Conflict(limit.to_string())
            }
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
