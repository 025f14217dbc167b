use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::dao::record_store::{Filter, ID_FIELD, Record, Table};

/// Column tagging every document with the table it belongs to.
pub const TABLE_FIELD: &str = "table";
const ID_KEY: &str = "_id";
const REV_KEY: &str = "_rev";

/// Upper bound sent as Mango `limit` when the caller wants every row.
pub const UNBOUNDED_LIMIT: usize = 1_000_000;

#[derive(Debug, Deserialize)]
pub struct FindResponse {
    pub docs: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct FindRequest {
    pub selector: Value,
    pub skip: usize,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<&'static str>>,
}

/// Row id of a document in `table` with primary key `id`.
pub fn doc_id(table: Table, id: &str) -> String {
    format!("{}::{}", table.name(), id)
}

/// Document id for a new record. Tables with a unique key derive it from those columns so
/// CouchDB's own `409 Conflict` enforces the constraint.
pub fn doc_id_for_insert(table: Table, record: &Record) -> Option<String> {
    match table.unique_key() {
        Some(columns) => {
            let parts = columns
                .iter()
                .map(|column| record.get(*column).and_then(Value::as_str))
                .collect::<Option<Vec<_>>>()?;
            Some(format!("{}::{}", table.name(), parts.join("::")))
        }
        None => record
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .map(|id| doc_id(table, id)),
    }
}

/// Wrap a record into a CouchDB document body.
pub fn to_document(table: Table, doc_id: &str, rev: Option<&str>, record: Record) -> Value {
    let mut body = record;
    body.insert(ID_KEY.into(), Value::String(doc_id.to_owned()));
    body.insert(TABLE_FIELD.into(), Value::String(table.name().to_owned()));
    if let Some(rev) = rev {
        body.insert(REV_KEY.into(), Value::String(rev.to_owned()));
    }
    Value::Object(body)
}

/// Split a CouchDB document into its record and revision, dropping bookkeeping columns.
pub fn from_document(document: Value) -> Option<(Record, Option<String>)> {
    let Value::Object(mut body) = document else {
        return None;
    };
    body.remove(ID_KEY);
    body.remove(TABLE_FIELD);
    let rev = match body.remove(REV_KEY) {
        Some(Value::String(rev)) => Some(rev),
        _ => None,
    };
    Some((body, rev))
}

/// Translate filters into a Mango selector scoped to `table`.
pub fn selector(table: Table, filters: &[Filter]) -> Value {
    let mut clauses = vec![clause(TABLE_FIELD, "$eq", Value::String(table.name().into()))];
    for filter in filters {
        let next = match filter {
            // A missing column counts as null.
            Filter::Eq(field, value) if value.is_null() => json!({ "$or": [
                clause(field, "$eq", Value::Null),
                clause(field, "$exists", Value::Bool(false)),
            ] }),
            Filter::Eq(field, value) => clause(field, "$eq", value.clone()),
            Filter::NotIn(field, values) => clause(field, "$nin", Value::Array(values.clone())),
        };
        clauses.push(next);
    }
    json!({ "$and": clauses })
}

/// `{ field: { op: value } }`
fn clause(field: &str, op: &str, value: Value) -> Value {
    let mut condition = Map::new();
    condition.insert(op.to_owned(), value);
    let mut clause = Map::new();
    clause.insert(field.to_owned(), Value::Object(condition));
    Value::Object(clause)
}

/// Document id for a room-scoped lookup by primary key.
pub fn doc_id_for(table: Table, id: Uuid) -> String {
    doc_id(table, &id.to_string())
}

/// Build a `_bulk_docs` deletion stub.
pub fn deletion_stub(doc_id: String, rev: String) -> Value {
    let mut stub = Map::new();
    stub.insert(ID_KEY.into(), Value::String(doc_id));
    stub.insert(REV_KEY.into(), Value::String(rev));
    stub.insert("_deleted".into(), Value::Bool(true));
    Value::Object(stub)
}

/// Read the `_id`/`_rev` pair out of a raw document.
pub fn doc_identity(document: &Value) -> Option<(String, String)> {
    let id = document.get(ID_KEY)?.as_str()?.to_owned();
    let rev = document.get(REV_KEY)?.as_str()?.to_owned();
    Some((id, rev))
}
