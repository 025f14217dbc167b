/// Answer persistence.
pub mod answer;
/// Database model definitions.
pub mod models;
/// Question catalog and per-room draw history persistence.
pub mod question;
/// Backend-agnostic record store contract and its adapters.
pub mod record_store;
/// Room persistence.
pub mod room;
/// Storage abstraction layer for database operations.
pub mod storage;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use self::{
    record_store::{Record, Table},
    storage::{StorageError, StorageResult},
};

/// Serialise an entity into the column map stored for `table`.
fn to_record<T: Serialize>(table: Table, entity: &T) -> StorageResult<Record> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(StorageError::MissingId {
            table: table.name(),
        }),
        Err(source) => Err(StorageError::Decode {
            table: table.name(),
            source,
        }),
    }
}

/// Rebuild an entity from a row read from `table`.
fn from_record<T: DeserializeOwned>(table: Table, record: Record) -> StorageResult<T> {
    serde_json::from_value(Value::Object(record)).map_err(|source| StorageError::Decode {
        table: table.name(),
        source,
    })
}
