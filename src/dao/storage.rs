use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or rejected the request.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What the store was doing.
        message: String,
        /// Underlying backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A uniqueness constraint rejected the write.
    #[error("duplicate record in `{table}`: {key}")]
    Conflict {
        /// Table written to.
        table: &'static str,
        /// Colliding key.
        key: String,
    },
    /// A record handed to the store carries no usable primary key.
    #[error("record for `{table}` has no `id` column")]
    MissingId {
        /// Table written to.
        table: &'static str,
    },
    /// A stored record could not be mapped onto the expected entity.
    #[error("malformed record in `{table}`")]
    Decode {
        /// Table read from.
        table: &'static str,
        /// Deserialization failure.
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Whether the failure is a duplicate-key rejection.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }
}
