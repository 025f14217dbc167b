use std::{sync::Arc, time::SystemTime};

use uuid::Uuid;

use crate::dao::{
    from_record,
    models::{QuestionEntity, QuestionHistoryEntity},
    record_store::{Filter, Pagination, RecordStore, Table},
    storage::StorageResult,
    to_record,
};

/// Data Access Object for the `questions` and `question_history` tables.
#[derive(Clone)]
pub struct QuestionRepository {
    store: Arc<dyn RecordStore>,
}

impl QuestionRepository {
    /// Repository reading and writing through `store`.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Add a question to the catalog.
    pub async fn insert(&self, question: &QuestionEntity) -> StorageResult<()> {
        self.store
            .insert(Table::Questions, to_record(Table::Questions, question)?)
            .await
    }

    /// Fetch a question by id.
    pub async fn find(&self, id: Uuid) -> StorageResult<Option<QuestionEntity>> {
        self.store
            .get_by_id(Table::Questions, id)
            .await?
            .map(|record| from_record(Table::Questions, record))
            .transpose()
    }

    /// Identifiers of every question already drawn in the room.
    pub async fn asked_question_ids(&self, room_id: Uuid) -> StorageResult<Vec<Uuid>> {
        let rows = self
            .store
            .list(
                Table::QuestionHistory,
                vec![Filter::eq("room_id", room_id.to_string())],
                Pagination::all(),
            )
            .await?;

        rows.into_iter()
            .map(|record| {
                from_record::<QuestionHistoryEntity>(Table::QuestionHistory, record)
                    .map(|entry| entry.question_id)
            })
            .collect()
    }

    /// Questions in `language`, restricted to `category_ids` when non-empty, minus `exclude`.
    ///
    /// Each category is queried on its own since the store only offers equality filters.
    pub async fn candidates(
        &self,
        language: &str,
        category_ids: &[Uuid],
        exclude: &[Uuid],
    ) -> StorageResult<Vec<QuestionEntity>> {
        let base = vec![
            Filter::eq("language", language),
            Filter::not_in("id", exclude.iter().map(Uuid::to_string)),
        ];

        let queries: Vec<Vec<Filter>> = if category_ids.is_empty() {
            vec![base]
        } else {
            category_ids
                .iter()
                .map(|category| {
                    let mut filters = base.clone();
                    filters.push(Filter::eq("category_id", category.to_string()));
                    filters
                })
                .collect()
        };

        let mut candidates = Vec::new();
        for filters in queries {
            let rows = self
                .store
                .list(Table::Questions, filters, Pagination::all())
                .await?;
            for record in rows {
                candidates.push(from_record::<QuestionEntity>(Table::Questions, record)?);
            }
        }
        Ok(candidates)
    }

    /// Append a history entry; a duplicate surfaces as `StorageError::Conflict`.
    pub async fn record_asked(&self, room_id: Uuid, question_id: Uuid) -> StorageResult<()> {
        let entry = QuestionHistoryEntity {
            id: Uuid::new_v4(),
            room_id,
            question_id,
            created_at: SystemTime::now(),
        };
        self.store
            .insert(
                Table::QuestionHistory,
                to_record(Table::QuestionHistory, &entry)?,
            )
            .await
    }

    /// Drop the history entry of `question_id` in the room; returns how many rows went away.
    pub async fn forget_asked(&self, room_id: Uuid, question_id: Uuid) -> StorageResult<usize> {
        self.store
            .delete_matching(
                Table::QuestionHistory,
                vec![
                    Filter::eq("room_id", room_id.to_string()),
                    Filter::eq("question_id", question_id.to_string()),
                ],
            )
            .await
    }

    /// Number of history entries recorded for the room.
    pub async fn history_len(&self, room_id: Uuid) -> StorageResult<usize> {
        self.store
            .count(
                Table::QuestionHistory,
                vec![Filter::eq("room_id", room_id.to_string())],
            )
            .await
    }
}
