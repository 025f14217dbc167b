use std::time::SystemTime;

use uuid::Uuid;

use crate::dao::models::{RoomEntity, RoomStatus};

impl RoomEntity {
    /// Build a fresh room in [`RoomStatus::Waiting`].
    ///
    /// Duplicate categories are collapsed so the selection behaves like a set.
    pub fn new(
        owner_id: Uuid,
        language: String,
        mut category_ids: Vec<Uuid>,
        max_questions: u32,
        now: SystemTime,
    ) -> Self {
        category_ids.sort();
        category_ids.dedup();

        Self {
            id: Uuid::new_v4(),
            owner_id,
            guest_id: None,
            status: RoomStatus::Waiting,
            language,
            category_ids,
            max_questions,
            current_question_index: 0,
            current_question_id: None,
            current_turn: None,
            paused_at: None,
            disconnected_party: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `user_id` is the owner or the guest.
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id || self.guest_id == Some(user_id)
    }

    /// The party that acts after `user_id`. With no guest the owner keeps every turn.
    pub fn next_turn_after(&self, user_id: Uuid) -> Uuid {
        match self.guest_id {
            Some(guest) if user_id == self.owner_id => guest,
            _ => self.owner_id,
        }
    }

    /// Whether another fresh draw would exceed the configured question count.
    pub fn question_limit_reached(&self) -> bool {
        self.max_questions > 0 && self.current_question_index >= self.max_questions
    }

    /// Describe the first broken room invariant, if any.
    pub fn invariant_violation(&self) -> Option<&'static str> {
        let in_game = matches!(self.status, RoomStatus::Playing | RoomStatus::Paused);
        if in_game && !self.current_turn.is_some_and(|turn| self.is_party(turn)) {
            return Some("current turn must belong to a party while in game");
        }
        if self.paused_at.is_some() != self.disconnected_party.is_some() {
            return Some("paused-at and disconnected party must be set together");
        }
        if (self.status == RoomStatus::Paused) != self.paused_at.is_some() {
            return Some("pause bookkeeping must be set exactly while paused");
        }
        None
    }
}
