//! Error types shared by the CouchDB storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`CouchDaoError`] failures.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures that can occur while interacting with CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// Required environment variable is missing.
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB rejected a GET against the target database.
    #[error("failed to query CouchDB database `{database}`")]
    DatabaseQuery {
        /// Database name.
        database: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB rejected a database creation request.
    #[error("failed to create CouchDB database `{database}`")]
    DatabaseCreate {
        /// Database name.
        database: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a database operation.
    #[error("unexpected CouchDB database response status {status} for `{database}`")]
    DatabaseStatus {
        /// Database name.
        database: String,
        /// Status code returned.
        status: StatusCode,
    },
    /// A request to a document endpoint could not be sent.
    #[error("failed to send CouchDB request to `{path}`")]
    RequestSend {
        /// Request path.
        path: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a document endpoint.
    #[error("unexpected CouchDB response status {status} for `{path}`")]
    RequestStatus {
        /// Request path.
        path: String,
        /// Status code returned.
        status: StatusCode,
    },
    /// The document already exists, or its revision moved on.
    #[error("CouchDB document conflict on `{doc_id}`")]
    Conflict {
        /// Table addressed.
        table: &'static str,
        /// Conflicting document id.
        doc_id: String,
    },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode CouchDB response for `{path}`")]
    DecodeResponse {
        /// Request path.
        path: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// A record handed to the store has no string `id` column.
    #[error("record for `{table}` has no `id` column")]
    MissingId {
        /// Table addressed.
        table: &'static str,
    },
    /// A guarded update kept losing the revision race.
    #[error("gave up updating `{doc_id}` after {attempts} revision conflicts")]
    RevisionContention {
        /// Contended document id.
        doc_id: String,
        /// Attempts made.
        attempts: u32,
    },
}

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        match err {
            CouchDaoError::Conflict { table, doc_id } => StorageError::Conflict { table, key: doc_id },
            CouchDaoError::MissingId { table } => StorageError::MissingId { table },
            other => StorageError::unavailable("CouchDB request failed".into(), other),
        }
    }
}
