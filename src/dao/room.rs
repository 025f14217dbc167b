use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::dao::{
    from_record,
    models::{RoomEntity, RoomStatus},
    record_store::{Filter, Pagination, RecordStore, Table},
    storage::StorageResult,
    to_record,
};

const TABLE: Table = Table::Rooms;

/// Kind of room write, deciding which columns are rewritten and which must be unchanged.
///
/// Writes never touch columns outside their own set, so two operations racing on different
/// columns (a draw and a pause, say) both keep their effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomWrite {
    /// A guest attaches to a waiting room.
    Join,
    /// The game starts together with its first draw.
    Start,
    /// A fresh question is committed.
    Draw,
    /// The turn passes and the in-flight question is rotated out.
    Turn,
    /// Pause or resume after a connectivity signal.
    Connection,
    /// The room reaches its terminal status.
    Finish,
}

impl RoomWrite {
    /// Columns copied from the new room state.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            RoomWrite::Join => &["status", "guest_id", "updated_at"],
            RoomWrite::Start => &[
                "status",
                "current_turn",
                "current_question_index",
                "current_question_id",
                "paused_at",
                "disconnected_party",
                "updated_at",
            ],
            RoomWrite::Draw => &["current_question_id", "current_question_index", "updated_at"],
            RoomWrite::Turn => &["current_turn", "current_question_id", "updated_at"],
            RoomWrite::Connection | RoomWrite::Finish => {
                &["status", "paused_at", "disconnected_party", "updated_at"]
            }
        }
    }

    /// Columns whose stored value must still equal the one the decision was based on.
    pub fn guarded(self) -> &'static [&'static str] {
        match self {
            RoomWrite::Join => &["status", "guest_id"],
            RoomWrite::Start | RoomWrite::Connection => &["status"],
            RoomWrite::Draw => &["status", "current_question_id", "current_question_index"],
            RoomWrite::Turn => &[
                "status",
                "current_turn",
                "current_question_id",
                "current_question_index",
            ],
            RoomWrite::Finish => &["status", "paused_at"],
        }
    }
}

/// Data Access Object for the `rooms` table.
#[derive(Clone)]
pub struct RoomRepository {
    store: Arc<dyn RecordStore>,
}

impl RoomRepository {
    /// Repository writing through `store`.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Persist a new room.
    pub async fn insert(&self, room: &RoomEntity) -> StorageResult<()> {
        self.store.insert(TABLE, to_record(TABLE, room)?).await
    }

    /// Fetch a room by id.
    pub async fn find(&self, id: Uuid) -> StorageResult<Option<RoomEntity>> {
        self.store
            .get_by_id(TABLE, id)
            .await?
            .map(|record| from_record(TABLE, record))
            .transpose()
    }

    /// Write the columns of `write` from `next`, provided the guarded columns still hold the
    /// values read in `seen`.
    ///
    /// Returns `false` when the room changed since it was read, or vanished.
    pub async fn commit(
        &self,
        write: RoomWrite,
        seen: &RoomEntity,
        next: &RoomEntity,
    ) -> StorageResult<bool> {
        let before = to_record(TABLE, seen)?;
        let guards = write
            .guarded()
            .iter()
            .map(|column| {
                let value = before.get(*column).cloned().unwrap_or(Value::Null);
                Filter::Eq(*column, value)
            })
            .collect();

        let mut fields = to_record(TABLE, next)?;
        fields.retain(|column, _| write.columns().contains(&column.as_str()));

        self.store.update_if(TABLE, seen.id, guards, fields).await
    }

    /// Rooms currently in `status`.
    pub async fn list_by_status(&self, status: RoomStatus) -> StorageResult<Vec<RoomEntity>> {
        self.store
            .list(
                TABLE,
                vec![Filter::eq("status", status.as_str())],
                Pagination::all(),
            )
            .await?
            .into_iter()
            .map(|record| from_record(TABLE, record))
            .collect()
    }
}
