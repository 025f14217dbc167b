use std::sync::Arc;

use tracing::{Span, debug};
use uuid::Uuid;

use crate::{
    dao::{
        models::{QuestionEntity, RoomEntity},
        question::QuestionRepository,
        record_store::RecordStore,
    },
    error::ServiceError,
    state::random::SharedRng,
};

/// Question picked by [`QuestionCatalog::draw`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawnQuestion {
    /// The question to show.
    pub question: QuestionEntity,
    /// Whether this call wrote the history entry, as opposed to finding one already there.
    pub recorded: bool,
}

/// Read-only question lookup plus the per-room "already asked" ledger.
#[derive(Clone)]
pub struct QuestionCatalog {
    questions: QuestionRepository,
    rng: SharedRng,
    span: Span,
}

impl QuestionCatalog {
    /// Catalog over `store`, picking with `rng` and logging inside `span`.
    pub fn new(store: Arc<dyn RecordStore>, rng: SharedRng, span: Span) -> Self {
        Self {
            questions: QuestionRepository::new(store),
            rng,
            span,
        }
    }

    /// Pick a question the room has not seen yet and record it as asked.
    ///
    /// Fails with [`ServiceError::QuestionsExhausted`] once every question matching the room's
    /// language and categories has been drawn.
    pub async fn draw(&self, room: &RoomEntity) -> Result<DrawnQuestion, ServiceError> {
        let asked = self.questions.asked_question_ids(room.id).await?;
        let candidates = self
            .questions
            .candidates(&room.language, &room.category_ids, &asked)
            .await?;

        let Some(question) = self.rng.choose(&candidates).cloned() else {
            return Err(ServiceError::QuestionsExhausted {
                language: room.language.clone(),
                categories: room.category_ids.clone(),
            });
        };

        let recorded = match self.questions.record_asked(room.id, question.id).await {
            Ok(()) => true,
            // Another draw recorded it first; the ledger already says what we need.
            Err(err) if err.is_conflict() => {
                debug!(
                    parent: &self.span,
                    room_id = %room.id,
                    question_id = %question.id,
                    "question already in history"
                );
                false
            }
            Err(err) => return Err(err.into()),
        };

        debug!(
            parent: &self.span,
            room_id = %room.id,
            question_id = %question.id,
            remaining = candidates.len() - 1,
            "question drawn"
        );
        Ok(DrawnQuestion { question, recorded })
    }

    /// Undo the history entry of a draw that never reached the room.
    ///
    /// Entries this draw did not write belong to another caller and are left alone.
    pub async fn release(&self, room_id: Uuid, drawn: &DrawnQuestion) -> Result<(), ServiceError> {
        if !drawn.recorded {
            return Ok(());
        }
        let removed = self
            .questions
            .forget_asked(room_id, drawn.question.id)
            .await?;
        debug!(
            parent: &self.span,
            %room_id,
            question_id = %drawn.question.id,
            removed,
            "draw released"
        );
        Ok(())
    }

    /// Fetch a question by id.
    pub async fn question(&self, id: Uuid) -> Result<QuestionEntity, ServiceError> {
        self.questions
            .find(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("question `{id}` not found")))
    }

    /// Add a question to the catalog.
    pub async fn add_question(
        &self,
        category_id: Uuid,
        language: String,
        text: String,
    ) -> Result<QuestionEntity, ServiceError> {
        if text.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "question text must not be empty".into(),
            ));
        }
        let question = QuestionEntity {
            id: Uuid::new_v4(),
            category_id,
            language,
            text,
        };
        self.questions.insert(&question).await?;
        Ok(question)
    }

    /// Number of questions already drawn in the room.
    pub async fn asked_count(&self, room_id: Uuid) -> Result<usize, ServiceError> {
        Ok(self.questions.history_len(room_id).await?)
    }
}
