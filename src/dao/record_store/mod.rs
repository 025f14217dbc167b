/// CouchDB adapter.
#[cfg(feature = "couch-store")]
pub mod couchdb;
/// In-memory adapter for tests and single-node runs.
pub mod memory;

use std::fmt;

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::dao::storage::StorageResult;

/// Schemaless row exchanged with the record store, keyed by column name.
pub type Record = Map<String, Value>;

/// Column every record carries as its primary key.
pub const ID_FIELD: &str = "id";

/// Durable tables the game core reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Game rooms.
    Rooms,
    /// Question catalog.
    Questions,
    /// Questions drawn per room, unique on `(room_id, question_id)`.
    QuestionHistory,
    /// Player answers.
    Answers,
}

impl Table {
    /// Every table, in declaration order.
    pub const ALL: [Table; 4] = [
        Table::Rooms,
        Table::Questions,
        Table::QuestionHistory,
        Table::Answers,
    ];

    /// Name of the table in the backing store.
    pub fn name(self) -> &'static str {
        match self {
            Table::Rooms => "rooms",
            Table::Questions => "questions",
            Table::QuestionHistory => "question_history",
            Table::Answers => "answers",
        }
    }

    /// Columns forming a uniqueness constraint beyond the primary key.
    pub fn unique_key(self) -> Option<&'static [&'static str]> {
        match self {
            Table::QuestionHistory => Some(&["room_id", "question_id"]),
            _ => None,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Row predicate understood by every backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Column equals the value (a missing column equals `null`).
    Eq(&'static str, Value),
    /// Column value is not one of the listed values.
    NotIn(&'static str, Vec<Value>),
}

impl Filter {
    /// Equality filter.
    pub fn eq(field: &'static str, value: impl Into<Value>) -> Self {
        Filter::Eq(field, value.into())
    }

    /// Exclusion filter.
    pub fn not_in<I, V>(field: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::NotIn(field, values.into_iter().map(Into::into).collect())
    }

    /// Evaluate the predicate against an in-memory record.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Eq(field, expected) => {
                record.get(*field).unwrap_or(&Value::Null) == expected
            }
            Filter::NotIn(field, excluded) => {
                let actual = record.get(*field).unwrap_or(&Value::Null);
                !excluded.contains(actual)
            }
        }
    }
}

/// Evaluate a conjunction of filters against a record.
pub fn matches_all(filters: &[Filter], record: &Record) -> bool {
    filters.iter().all(|filter| filter.matches(record))
}

/// Window applied to list results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    /// Rows skipped before the window.
    pub offset: usize,
    /// Maximum rows returned; unbounded when absent.
    pub limit: Option<usize>,
}

impl Pagination {
    /// Return every matching row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Window of at most `limit` rows after `offset`.
    pub fn page(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }
}

/// Client contract of the relational store backing rooms, questions, history and answers.
///
/// Implementations must reject an insert that collides with the primary key or with
/// [`Table::unique_key`] using [`StorageError::Conflict`](crate::dao::storage::StorageError),
/// and must apply [`RecordStore::update_if`] atomically with respect to other writes on the
/// same row.
pub trait RecordStore: Send + Sync {
    /// Fetch one row by primary key.
    fn get_by_id(&self, table: Table, id: Uuid) -> BoxFuture<'static, StorageResult<Option<Record>>>;
    /// Rows matching every filter, windowed by `page`.
    fn list(
        &self,
        table: Table,
        filters: Vec<Filter>,
        page: Pagination,
    ) -> BoxFuture<'static, StorageResult<Vec<Record>>>;
    /// Count rows matching every filter.
    fn count(&self, table: Table, filters: Vec<Filter>) -> BoxFuture<'static, StorageResult<usize>>;
    /// Add a row, rejecting key collisions with a conflict.
    fn insert(&self, table: Table, record: Record) -> BoxFuture<'static, StorageResult<()>>;
    /// Merge `fields` into the row; resolves to `false` when the row does not exist.
    fn update(&self, table: Table, id: Uuid, fields: Record) -> BoxFuture<'static, StorageResult<bool>>;
    /// Merge `fields` only if the row still satisfies every guard; resolves to whether the
    /// write was applied.
    fn update_if(
        &self,
        table: Table,
        id: Uuid,
        guards: Vec<Filter>,
        fields: Record,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Remove rows matching every filter; resolves to the number removed.
    fn delete_matching(
        &self,
        table: Table,
        filters: Vec<Filter>,
    ) -> BoxFuture<'static, StorageResult<usize>>;
    /// Check that the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn eq_filter_treats_missing_column_as_null() {
        let row = record(json!({"id": "a", "guest_id": null}));
        assert!(Filter::Eq("guest_id", Value::Null).matches(&row));
        assert!(Filter::Eq("current_question_id", Value::Null).matches(&row));
        assert!(!Filter::eq("id", "b").matches(&row));
    }

    #[test]
    fn not_in_filter_excludes_listed_values() {
        let row = record(json!({"id": "q1", "language": "en"}));
        assert!(!Filter::not_in("id", ["q1", "q2"]).matches(&row));
        assert!(Filter::not_in("id", ["q3"]).matches(&row));
        assert!(Filter::not_in("id", Vec::<String>::new()).matches(&row));
    }

    #[test]
    fn history_is_the_only_table_with_a_unique_key() {
        for table in Table::ALL {
            assert_eq!(
                table.unique_key().is_some(),
                table == Table::QuestionHistory,
                "{table}"
            );
        }
    }
}
