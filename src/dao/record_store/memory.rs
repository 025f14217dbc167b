//! In-process record store used by tests and by the binary when no database is configured.

use std::sync::Arc;

use dashmap::DashMap;
use futures::{FutureExt, future::BoxFuture};
use indexmap::IndexMap;
use serde_json::Value;
use uuid::Uuid;

use crate::dao::storage::{StorageError, StorageResult};

use super::{Filter, ID_FIELD, Pagination, Record, RecordStore, Table, matches_all};

/// Rows of one table keyed by primary key, kept in insertion order.
type Rows = IndexMap<String, Record>;

/// Thread-safe in-memory implementation of [`RecordStore`].
///
/// Each table lives behind its own shard lock, so a conditional update or a unique-key check
/// observes and mutates the table atomically.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    tables: Arc<DashMap<Table, Rows>>,
}

impl MemoryRecordStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, table: Table, f: impl FnOnce(&Rows) -> T) -> T {
        match self.tables.get(&table) {
            Some(rows) => f(&rows),
            None => f(&Rows::new()),
        }
    }

    fn write<T>(&self, table: Table, f: impl FnOnce(&mut Rows) -> T) -> T {
        let mut rows = self.tables.entry(table).or_default();
        f(&mut rows)
    }

    fn insert_now(&self, table: Table, record: Record) -> StorageResult<()> {
        let id = record
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(StorageError::MissingId {
                table: table.name(),
            })?;

        self.write(table, |rows| {
            if rows.contains_key(&id) {
                return Err(StorageError::Conflict {
                    table: table.name(),
                    key: id,
                });
            }

            if let Some(columns) = table.unique_key() {
                let key: Vec<&Value> = columns
                    .iter()
                    .map(|column| record.get(*column).unwrap_or(&Value::Null))
                    .collect();
                let duplicate = rows.values().any(|existing| {
                    columns
                        .iter()
                        .zip(&key)
                        .all(|(column, value)| existing.get(*column).unwrap_or(&Value::Null) == *value)
                });
                if duplicate {
                    return Err(StorageError::Conflict {
                        table: table.name(),
                        key: format!("{key:?}"),
                    });
                }
            }

            rows.insert(id, record);
            Ok(())
        })
    }

    fn update_now(&self, table: Table, id: Uuid, guards: &[Filter], fields: Record) -> bool {
        self.write(table, |rows| {
            let Some(row) = rows.get_mut(&id.to_string()) else {
                return false;
            };
            if !matches_all(guards, row) {
                return false;
            }
            for (column, value) in fields {
                if column != ID_FIELD {
                    row.insert(column, value);
                }
            }
            true
        })
    }
}

impl RecordStore for MemoryRecordStore {
    fn get_by_id(&self, table: Table, id: Uuid) -> BoxFuture<'static, StorageResult<Option<Record>>> {
        let found = self.read(table, |rows| rows.get(&id.to_string()).cloned());
        futures::future::ready(Ok(found)).boxed()
    }

    fn list(
        &self,
        table: Table,
        filters: Vec<Filter>,
        page: Pagination,
    ) -> BoxFuture<'static, StorageResult<Vec<Record>>> {
        let rows = self.read(table, |rows| {
            let matching = rows
                .values()
                .filter(|row| matches_all(&filters, row))
                .skip(page.offset);
            match page.limit {
                Some(limit) => matching.take(limit).cloned().collect(),
                None => matching.cloned().collect::<Vec<_>>(),
            }
        });
        futures::future::ready(Ok(rows)).boxed()
    }

    fn count(&self, table: Table, filters: Vec<Filter>) -> BoxFuture<'static, StorageResult<usize>> {
        let total = self.read(table, |rows| {
            rows.values().filter(|row| matches_all(&filters, row)).count()
        });
        futures::future::ready(Ok(total)).boxed()
    }

    fn insert(&self, table: Table, record: Record) -> BoxFuture<'static, StorageResult<()>> {
        futures::future::ready(self.insert_now(table, record)).boxed()
    }

    fn update(&self, table: Table, id: Uuid, fields: Record) -> BoxFuture<'static, StorageResult<bool>> {
        futures::future::ready(Ok(self.update_now(table, id, &[], fields))).boxed()
    }

    fn update_if(
        &self,
        table: Table,
        id: Uuid,
        guards: Vec<Filter>,
        fields: Record,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        futures::future::ready(Ok(self.update_now(table, id, &guards, fields))).boxed()
    }

    fn delete_matching(
        &self,
        table: Table,
        filters: Vec<Filter>,
    ) -> BoxFuture<'static, StorageResult<usize>> {
        let removed = self.write(table, |rows| {
            let before = rows.len();
            rows.retain(|_, row| !matches_all(&filters, row));
            before - rows.len()
        });
        futures::future::ready(Ok(removed)).boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        futures::future::ready(Ok(())).boxed()
    }
}
