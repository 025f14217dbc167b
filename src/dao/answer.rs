use std::sync::Arc;

use uuid::Uuid;

use crate::dao::{
    from_record,
    models::AnswerEntity,
    record_store::{Filter, Pagination, RecordStore, Table},
    storage::StorageResult,
    to_record,
};

const TABLE: Table = Table::Answers;

/// Data Access Object for the `answers` table.
#[derive(Clone)]
pub struct AnswerRepository {
    store: Arc<dyn RecordStore>,
}

impl AnswerRepository {
    /// Repository writing through `store`.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Persist a new answer.
    pub async fn insert(&self, answer: &AnswerEntity) -> StorageResult<()> {
        self.store.insert(TABLE, to_record(TABLE, answer)?).await
    }

    /// Answers of a room, oldest first.
    pub async fn list_for_room(&self, room_id: Uuid) -> StorageResult<Vec<AnswerEntity>> {
        let mut answers = self
            .store
            .list(
                TABLE,
                vec![Filter::eq("room_id", room_id.to_string())],
                Pagination::all(),
            )
            .await?
            .into_iter()
            .map(|record| from_record::<AnswerEntity>(TABLE, record))
            .collect::<Result<Vec<_>, _>>()?;

        // Backends do not promise insertion order.
        answers.sort_by_key(|answer| answer.created_at);
        Ok(answers)
    }

    /// Number of answers recorded in a room.
    pub async fn count_for_room(&self, room_id: Uuid) -> StorageResult<usize> {
        self.store
            .count(TABLE, vec![Filter::eq("room_id", room_id.to_string())])
            .await
    }
}
