use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    record_store::{Filter, Pagination, Record, RecordStore, Table, matches_all},
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        FindRequest, FindResponse, UNBOUNDED_LIMIT, deletion_stub, doc_id_for, doc_id_for_insert,
        doc_identity, from_document, selector, to_document,
    },
};

const FIND: &str = "_find";
const BULK_DOCS: &str = "_bulk_docs";
/// Attempts made by an update before giving up on a contended document.
const MAX_REVISION_ATTEMPTS: u32 = 5;

/// [`RecordStore`] backed by a single CouchDB database, one document per row.
#[derive(Clone)]
pub struct CouchRecordStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchRecordStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authorize(self.client.request(method, url))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = format!("{}/{}", self.base_url, self.database);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document(&self, doc_id: &str) -> CouchResult<Option<Value>> {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<Value>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// PUT a document. Both "already exists" and "stale revision" come back as
    /// [`CouchDaoError::Conflict`].
    async fn put_document(&self, table: Table, doc_id: &str, document: &Value) -> CouchResult<()> {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Err(CouchDaoError::Conflict {
                table: table.name(),
                doc_id: doc_id.to_string(),
            }),
            status if status.is_success() => Ok(()),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn find_documents(
        &self,
        table: Table,
        filters: &[Filter],
        page: Pagination,
        fields: Option<Vec<&'static str>>,
    ) -> CouchResult<Vec<Value>> {
        let body = FindRequest {
            selector: selector(table, filters),
            skip: page.offset,
            limit: page.limit.unwrap_or(UNBOUNDED_LIMIT),
            fields,
        };

        let response = self
            .request(Method::POST, FIND)
            .json(&body)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: FIND.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: FIND.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<FindResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: FIND.to_string(),
                source,
            }
        })?;
        Ok(payload.docs)
    }

    /// Read-merge-write loop guarded by the document revision.
    async fn merge_into(
        &self,
        table: Table,
        id: Uuid,
        guards: &[Filter],
        fields: Record,
    ) -> CouchResult<bool> {
        let doc_id = doc_id_for(table, id);

        for attempt in 1..=MAX_REVISION_ATTEMPTS {
            let Some((mut record, rev)) = self
                .get_document(&doc_id)
                .await?
                .and_then(from_document)
            else {
                return Ok(false);
            };

            if !matches_all(guards, &record) {
                return Ok(false);
            }

            for (column, value) in fields.clone() {
                record.insert(column, value);
            }

            let document = to_document(table, &doc_id, rev.as_deref(), record);
            match self.put_document(table, &doc_id, &document).await {
                Ok(()) => return Ok(true),
                Err(CouchDaoError::Conflict { .. }) => {
                    debug!(%doc_id, attempt, "revision conflict; re-reading document");
                }
                Err(err) => return Err(err),
            }
        }

        Err(CouchDaoError::RevisionContention {
            doc_id,
            attempts: MAX_REVISION_ATTEMPTS,
        })
    }

    async fn delete_documents(&self, table: Table, filters: &[Filter]) -> CouchResult<usize> {
        let stubs: Vec<Value> = self
            .find_documents(table, filters, Pagination::all(), Some(vec!["_id", "_rev"]))
            .await?
            .iter()
            .filter_map(doc_identity)
            .map(|(doc_id, rev)| deletion_stub(doc_id, rev))
            .collect();

        if stubs.is_empty() {
            return Ok(0);
        }

        let removed = stubs.len();
        let response = self
            .request(Method::POST, BULK_DOCS)
            .json(&json!({ "docs": stubs }))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: BULK_DOCS.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(removed)
        } else {
            Err(CouchDaoError::RequestStatus {
                path: BULK_DOCS.to_string(),
                status: response.status(),
            })
        }
    }
}

impl RecordStore for CouchRecordStore {
    fn get_by_id(&self, table: Table, id: Uuid) -> BoxFuture<'static, StorageResult<Option<Record>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store.get_document(&doc_id_for(table, id)).await?;
            Ok(document.and_then(from_document).map(|(record, _rev)| record))
        })
    }

    fn list(
        &self,
        table: Table,
        filters: Vec<Filter>,
        page: Pagination,
    ) -> BoxFuture<'static, StorageResult<Vec<Record>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents = store.find_documents(table, &filters, page, None).await?;
            Ok(documents
                .into_iter()
                .filter_map(from_document)
                .map(|(record, _rev)| record)
                .collect())
        })
    }

    fn count(&self, table: Table, filters: Vec<Filter>) -> BoxFuture<'static, StorageResult<usize>> {
        let store = self.clone();
        Box::pin(async move {
            let documents = store
                .find_documents(table, &filters, Pagination::all(), Some(vec!["_id"]))
                .await?;
            Ok(documents.len())
        })
    }

    fn insert(&self, table: Table, record: Record) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = doc_id_for_insert(table, &record).ok_or(CouchDaoError::MissingId {
                table: table.name(),
            })?;
            let document = to_document(table, &doc_id, None, record);
            store
                .put_document(table, &doc_id, &document)
                .await
                .map_err(Into::into)
        })
    }

    fn update(&self, table: Table, id: Uuid, fields: Record) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.merge_into(table, id, &[], fields).await?) })
    }

    fn update_if(
        &self,
        table: Table,
        id: Uuid,
        guards: Vec<Filter>,
        fields: Record,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.merge_into(table, id, &guards, fields).await?) })
    }

    fn delete_matching(
        &self,
        table: Table,
        filters: Vec<Filter>,
    ) -> BoxFuture<'static, StorageResult<usize>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.delete_documents(table, &filters).await?) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = format!("{}/{}", store.base_url, store.database);
            let response = store
                .authorize(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }
}
