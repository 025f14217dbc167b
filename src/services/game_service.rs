//! Game session orchestrator.
//!
//! Every operation reads the room, validates the request, writes through the record store and
//! only then publishes the matching realtime event. A store failure aborts the operation before
//! anything is published. Room writes only rewrite the columns an operation owns and are
//! guarded on the values the decision was based on; a write that finds the room changed
//! re-reads it and decides again.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use serde::Serialize;
use tracing::{Span, debug, info, info_span, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::{
        answer::AnswerRepository,
        models::{AnswerAction, AnswerEntity, QuestionEntity, RoomEntity, RoomStatus},
        record_store::RecordStore,
        room::{RoomRepository, RoomWrite},
        storage::StorageResult,
    },
    dto::events::FinishReason,
    error::ServiceError,
    services::{
        notifications::{GUEST_JOINED_MESSAGE, Notifier, YOUR_TURN_MESSAGE},
        question_catalog::{DrawnQuestion, QuestionCatalog},
        realtime_events,
    },
    state::{
        clock::{Clock, SystemClock},
        event_bus::EventBus,
        random::SharedRng,
        state_machine::{RoomEvent, Transition, compute_transition},
    },
};

/// Reads of a room a single operation performs before giving up on concurrent writers.
const COMMIT_ATTEMPTS: usize = 3;

/// Collaborators injected into [`GameService::new`].
pub struct GameServiceOptions {
    /// Source of `paused_at` and `updated_at` timestamps.
    pub clock: Arc<dyn Clock>,
    /// Random source for first turns and question picks.
    pub rng: SharedRng,
    /// Span every log line of the service is emitted in.
    pub span: Span,
}

impl Default for GameServiceOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            rng: SharedRng::from_os(),
            span: info_span!("game_service"),
        }
    }
}

/// Question currently on the table for a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draw {
    /// The question to show.
    pub question: QuestionEntity,
    /// Number of questions drawn in the room, this one included.
    pub index: u32,
    /// `false` when an in-flight question was returned instead of drawing a new one.
    pub fresh: bool,
}

/// Outcome of [`GameService::start_game`].
#[derive(Debug, Clone)]
pub struct GameStart {
    /// Room as written by the start.
    pub room: RoomEntity,
    /// First question of the game.
    pub draw: Draw,
}

/// Outcome of an operation that may be an idempotent no-op.
#[derive(Debug, Clone)]
pub struct StateChange {
    /// Room as written, or as read when nothing changed.
    pub room: RoomEntity,
    /// Whether the room was written (and an event published).
    pub applied: bool,
}

impl StateChange {
    fn applied(room: RoomEntity) -> Self {
        Self {
            room,
            applied: true,
        }
    }

    fn unchanged(room: RoomEntity) -> Self {
        Self {
            room,
            applied: false,
        }
    }
}

/// Result of a reconnection timeout check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectionCheck {
    /// The limit elapsed; the room is now finished.
    TimedOut,
    /// Still paused and within the limit.
    NotTimedOut,
    /// The room is not paused; nothing was checked or changed.
    NotPaused,
}

/// A room together with the text of its in-flight question.
#[derive(Debug, Clone)]
pub struct RoomView {
    /// Stored room state.
    pub room: RoomEntity,
    /// In-flight question, if any.
    pub question: Option<QuestionEntity>,
}

/// Drives rooms through their lifecycle and publishes every change on the event bus.
#[derive(Clone)]
pub struct GameService {
    rooms: RoomRepository,
    answers: AnswerRepository,
    catalog: QuestionCatalog,
    bus: EventBus,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    rng: SharedRng,
    span: Span,
}

impl GameService {
    /// Service over `store`, publishing on `bus`.
    pub fn new(store: Arc<dyn RecordStore>, bus: EventBus, options: GameServiceOptions) -> Self {
        let GameServiceOptions { clock, rng, span } = options;
        Self {
            rooms: RoomRepository::new(store.clone()),
            answers: AnswerRepository::new(store.clone()),
            catalog: QuestionCatalog::new(store, rng.clone(), span.clone()),
            notifier: Notifier::new(bus.clone(), span.clone()),
            bus,
            clock,
            rng,
            span,
        }
    }

    /// Bus every room and user event is published on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Question catalog the service draws from.
    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    /// Open a room in `waiting` for `owner_id`.
    pub async fn create_room(
        &self,
        owner_id: Uuid,
        language: &str,
        category_ids: Vec<Uuid>,
        max_questions: u32,
    ) -> Result<RoomEntity, ServiceError> {
        let language = language.trim();
        if language.is_empty() {
            return Err(ServiceError::InvalidInput(
                "language must not be empty".into(),
            ));
        }

        let room = RoomEntity::new(
            owner_id,
            language.to_owned(),
            category_ids,
            max_questions,
            self.clock.now(),
        );
        self.rooms.insert(&room).await?;

        info!(parent: &self.span, room_id = %room.id, %owner_id, "room created");
        Ok(room)
    }

    /// Attach `guest_id` to a waiting room. Joining again as the same guest is a no-op.
    pub async fn join_room(
        &self,
        room_id: Uuid,
        guest_id: Uuid,
    ) -> Result<StateChange, ServiceError> {
        let change = self
            .apply(room_id, RoomWrite::Join, |room| {
                if guest_id == room.owner_id {
                    return Err(ServiceError::InvalidInput(
                        "the owner cannot join their own room as guest".into(),
                    ));
                }
                match room.guest_id {
                    Some(existing) if existing == guest_id => return Ok(None),
                    Some(_) => {
                        return Err(ServiceError::InvalidState(format!(
                            "room `{room_id}` already has a guest"
                        )));
                    }
                    None => {}
                }

                let mut next = room.clone();
                next.status = required_transition(room.status, RoomEvent::GuestJoined)?;
                next.guest_id = Some(guest_id);
                next.updated_at = self.clock.now();
                Ok(Some(next))
            })
            .await?;

        if change.applied {
            info!(parent: &self.span, %room_id, %guest_id, "guest joined");
            self.notifier.notify(change.room.owner_id, Some(room_id), GUEST_JOINED_MESSAGE);
        }
        Ok(change)
    }

    /// Start the game: pick who plays first, switch to `playing` and draw the first question.
    ///
    /// The status and the first draw are written together, so a failed draw leaves the room
    /// where it was and publishes nothing.
    pub async fn start_game(&self, room_id: Uuid) -> Result<GameStart, ServiceError> {
        let seen = self.load_room(room_id).await?;
        let status = required_transition(seen.status, RoomEvent::StartGame)?;
        let drawn = self.catalog.draw(&seen).await?;

        let first = self.first_turn(&seen);
        let mut room = seen.clone();
        room.status = status;
        room.current_turn = Some(first);
        room.current_question_index = 1;
        room.current_question_id = Some(drawn.question.id);
        room.paused_at = None;
        room.disconnected_party = None;
        room.updated_at = self.clock.now();

        let committed = self.rooms.commit(RoomWrite::Start, &seen, &room).await;
        if !self.settle_draw(room_id, &drawn, committed).await? {
            return Err(ServiceError::InvalidState(format!(
                "room `{room_id}` changed while starting"
            )));
        }

        info!(parent: &self.span, %room_id, current_turn = %first, "game started");
        realtime_events::broadcast_game_started(&self.bus, &self.span, &room);
        self.notifier.notify(first, Some(room_id), YOUR_TURN_MESSAGE);
        realtime_events::broadcast_question_drawn(&self.bus, &self.span, &room, &drawn.question);

        Ok(GameStart {
            room,
            draw: Draw {
                question: drawn.question,
                index: 1,
                fresh: true,
            },
        })
    }

    /// Return the in-flight question, or draw and record a new one.
    ///
    /// Of several concurrent fresh draws exactly one is committed; the others return its
    /// question with `fresh: false`.
    pub async fn draw_question(&self, room_id: Uuid) -> Result<Draw, ServiceError> {
        let seen = self.load_room(room_id).await?;
        ensure_playing(&seen, "draw")?;

        if let Some(question_id) = seen.current_question_id {
            return Ok(Draw {
                question: self.catalog.question(question_id).await?,
                index: seen.current_question_index,
                fresh: false,
            });
        }
        if seen.question_limit_reached() {
            return Err(ServiceError::QuestionLimitReached {
                max: seen.max_questions,
            });
        }

        let drawn = self.catalog.draw(&seen).await?;
        let mut room = seen.clone();
        room.current_question_id = Some(drawn.question.id);
        room.current_question_index += 1;
        room.updated_at = self.clock.now();

        let committed = self.rooms.commit(RoomWrite::Draw, &seen, &room).await;
        if !self.settle_draw(room_id, &drawn, committed).await? {
            return self.adopt_winning_draw(room_id).await;
        }

        realtime_events::broadcast_question_drawn(&self.bus, &self.span, &room, &drawn.question);
        Ok(Draw {
            question: drawn.question,
            index: room.current_question_index,
            fresh: true,
        })
    }

    /// Record a player's reaction to the in-flight question.
    ///
    /// `action` must be `answered` or `passed`; passed answers are stored with an empty body.
    pub async fn submit_answer(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        action: &str,
        body: String,
    ) -> Result<AnswerEntity, ServiceError> {
        let action: AnswerAction = action.parse()?;
        let body = match action {
            AnswerAction::Passed => String::new(),
            AnswerAction::Answered if body.trim().is_empty() => {
                return Err(ServiceError::InvalidInput(
                    "an answered question needs a body".into(),
                ));
            }
            AnswerAction::Answered => body,
        };

        let room = self.load_room(room_id).await?;
        if !room.is_party(user_id) {
            return Err(ServiceError::InvalidInput(format!(
                "user `{user_id}` does not play in room `{room_id}`"
            )));
        }
        ensure_playing(&room, "answer")?;
        let Some(question_id) = room.current_question_id else {
            return Err(ServiceError::InvalidState(
                "no question is currently drawn".into(),
            ));
        };

        let answer = AnswerEntity {
            id: Uuid::new_v4(),
            room_id,
            question_id,
            user_id,
            body,
            action,
            created_at: self.clock.now(),
        };
        self.answers.insert(&answer).await?;

        debug!(parent: &self.span, %room_id, %user_id, ?action, "answer recorded");
        realtime_events::broadcast_answer_submitted(&self.bus, &self.span, &answer);
        Ok(answer)
    }

    /// Hand the turn to the other party and clear the in-flight question.
    ///
    /// When `from` is given the change only applies while `from` holds the turn, so a retried
    /// request does not flip the turn twice.
    pub async fn change_turn(
        &self,
        room_id: Uuid,
        from: Option<Uuid>,
    ) -> Result<StateChange, ServiceError> {
        let change = self
            .apply(room_id, RoomWrite::Turn, |room| {
                ensure_playing(room, "change turn")?;
                let current = room.current_turn.unwrap_or(room.owner_id);
                if let Some(from) = from {
                    if !room.is_party(from) {
                        return Err(ServiceError::InvalidInput(format!(
                            "user `{from}` does not play in room `{room_id}`"
                        )));
                    }
                    if from != current {
                        return Ok(None);
                    }
                }

                let mut next = room.clone();
                next.current_turn = Some(room.next_turn_after(current));
                next.current_question_id = None;
                next.updated_at = self.clock.now();
                Ok(Some(next))
            })
            .await?;

        if !change.applied {
            debug!(parent: &self.span, %room_id, ?from, "turn already changed");
            return Ok(change);
        }

        let next = change.room.current_turn.unwrap_or(change.room.owner_id);
        debug!(parent: &self.span, %room_id, current_turn = %next, "turn changed");
        realtime_events::broadcast_turn_changed(&self.bus, &self.span, room_id, next);
        self.notifier.notify(next, Some(room_id), YOUR_TURN_MESSAGE);
        Ok(change)
    }

    /// Finish the game. Ending a finished room is a no-op.
    pub async fn end_game(&self, room_id: Uuid) -> Result<StateChange, ServiceError> {
        let change = self
            .apply(room_id, RoomWrite::Finish, |room| {
                let status = match compute_transition(room.status, RoomEvent::EndGame)? {
                    Transition::To(status) => status,
                    Transition::Ignore => return Ok(None),
                };
                let mut next = room.clone();
                next.status = status;
                next.paused_at = None;
                next.disconnected_party = None;
                next.updated_at = self.clock.now();
                Ok(Some(next))
            })
            .await?;

        if change.applied {
            info!(parent: &self.span, %room_id, "game finished");
            realtime_events::broadcast_game_finished(
                &self.bus,
                &self.span,
                &change.room,
                FinishReason::Ended,
            );
        }
        Ok(change)
    }

    /// Pause a playing room because `party` lost its connection; a no-op in any other status.
    pub async fn pause_game(
        &self,
        room_id: Uuid,
        party: Uuid,
    ) -> Result<StateChange, ServiceError> {
        let change = self
            .apply(room_id, RoomWrite::Connection, |room| {
                let status = match compute_transition(room.status, RoomEvent::Pause)? {
                    Transition::To(status) => status,
                    Transition::Ignore => return Ok(None),
                };
                if !room.is_party(party) {
                    return Err(ServiceError::InvalidInput(format!(
                        "user `{party}` does not play in room `{room_id}`"
                    )));
                }

                let now = self.clock.now();
                let mut next = room.clone();
                next.status = status;
                next.paused_at = Some(now);
                next.disconnected_party = Some(party);
                next.updated_at = now;
                Ok(Some(next))
            })
            .await?;

        if change.applied {
            info!(parent: &self.span, %room_id, disconnected_party = %party, "game paused");
            realtime_events::broadcast_game_paused(&self.bus, &self.span, &change.room);
        }
        Ok(change)
    }

    /// Resume a paused room; a no-op in any other status.
    pub async fn resume_game(&self, room_id: Uuid) -> Result<StateChange, ServiceError> {
        let change = self
            .apply(room_id, RoomWrite::Connection, |room| {
                let status = match compute_transition(room.status, RoomEvent::Resume)? {
                    Transition::To(status) => status,
                    Transition::Ignore => return Ok(None),
                };
                let mut next = room.clone();
                next.status = status;
                next.paused_at = None;
                next.disconnected_party = None;
                next.updated_at = self.clock.now();
                Ok(Some(next))
            })
            .await?;

        if change.applied {
            info!(parent: &self.span, %room_id, "game resumed");
            realtime_events::broadcast_game_resumed(&self.bus, &self.span, room_id);
        }
        Ok(change)
    }

    /// Finish a paused room whose pause lasted strictly longer than `limit`.
    ///
    /// Never touches a room that is not paused, including one resumed while the check ran.
    pub async fn check_reconnection_timeout(
        &self,
        room_id: Uuid,
        limit: Duration,
    ) -> Result<ReconnectionCheck, ServiceError> {
        let mut outcome = ReconnectionCheck::NotPaused;
        let change = self
            .apply(room_id, RoomWrite::Finish, |room| {
                let (RoomStatus::Paused, Some(paused_at)) = (room.status, room.paused_at) else {
                    outcome = ReconnectionCheck::NotPaused;
                    return Ok(None);
                };
                let now = self.clock.now();
                if paused_for(paused_at, now) <= limit {
                    outcome = ReconnectionCheck::NotTimedOut;
                    return Ok(None);
                }

                let mut next = room.clone();
                next.status = required_transition(room.status, RoomEvent::EndGame)?;
                next.paused_at = None;
                next.disconnected_party = None;
                next.updated_at = now;
                outcome = ReconnectionCheck::TimedOut;
                Ok(Some(next))
            })
            .await?;

        if change.applied {
            info!(parent: &self.span, %room_id, limit_secs = limit.as_secs(), "reconnection timed out");
            realtime_events::broadcast_game_finished(
                &self.bus,
                &self.span,
                &change.room,
                FinishReason::ReconnectionTimeout,
            );
        }
        Ok(outcome)
    }

    /// Current state of a room, including its in-flight question.
    pub async fn room(&self, room_id: Uuid) -> Result<RoomView, ServiceError> {
        let room = self.load_room(room_id).await?;
        let question = match room.current_question_id {
            Some(id) => Some(self.catalog.question(id).await?),
            None => None,
        };
        Ok(RoomView { room, question })
    }

    /// Answers of a room, oldest first.
    pub async fn list_answers(&self, room_id: Uuid) -> Result<Vec<AnswerEntity>, ServiceError> {
        self.load_room(room_id).await?;
        Ok(self.answers.list_for_room(room_id).await?)
    }

    /// Number of answers recorded in the room.
    pub async fn answer_count(&self, room_id: Uuid) -> Result<usize, ServiceError> {
        self.load_room(room_id).await?;
        Ok(self.answers.count_for_room(room_id).await?)
    }

    /// Rooms waiting for a disconnected party.
    pub async fn paused_rooms(&self) -> Result<Vec<RoomEntity>, ServiceError> {
        Ok(self.rooms.list_by_status(RoomStatus::Paused).await?)
    }

    /// Read the room, let `decide` derive its next state and commit it, re-reading when a
    /// concurrent write got there first. `decide` returning `None` means nothing to do.
    async fn apply<F>(
        &self,
        room_id: Uuid,
        write: RoomWrite,
        mut decide: F,
    ) -> Result<StateChange, ServiceError>
    where
        F: FnMut(&RoomEntity) -> Result<Option<RoomEntity>, ServiceError>,
    {
        for attempt in 1..=COMMIT_ATTEMPTS {
            let seen = self.load_room(room_id).await?;
            let Some(next) = decide(&seen)? else {
                return Ok(StateChange::unchanged(seen));
            };
            debug_assert_eq!(next.invariant_violation(), None, "room {room_id}");

            if self.rooms.commit(write, &seen, &next).await? {
                return Ok(StateChange::applied(next));
            }
            debug!(parent: &self.span, %room_id, ?write, attempt, "room changed concurrently");
        }

        Err(ServiceError::InvalidState(format!(
            "room `{room_id}` kept changing; retry the request"
        )))
    }

    /// Resolve the room write of a fresh draw. Unless the room ends up holding the drawn
    /// question, its history entry is released so the question stays drawable.
    async fn settle_draw(
        &self,
        room_id: Uuid,
        drawn: &DrawnQuestion,
        committed: StorageResult<bool>,
    ) -> Result<bool, ServiceError> {
        let failure = match committed {
            Ok(true) => return Ok(true),
            Ok(false) => None,
            Err(err) => Some(err),
        };

        if drawn.recorded {
            self.release_unless_held(room_id, drawn).await;
        }
        match failure {
            Some(err) => Err(err.into()),
            None => Ok(false),
        }
    }

    async fn release_unless_held(&self, room_id: Uuid, drawn: &DrawnQuestion) {
        let question_id = drawn.question.id;
        match self.rooms.find(room_id).await {
            // A concurrent draw that found our entry committed the same question.
            Ok(Some(room)) if room.current_question_id == Some(question_id) => {}
            Ok(_) => {
                if let Err(err) = self.catalog.release(room_id, drawn).await {
                    warn!(parent: &self.span, %room_id, %question_id, error = %err, "failed to release draw");
                }
            }
            Err(err) => {
                warn!(parent: &self.span, %room_id, %question_id, error = %err, "room unreadable; draw kept in history");
            }
        }
    }

    /// A concurrent draw committed first: return its question without publishing.
    async fn adopt_winning_draw(&self, room_id: Uuid) -> Result<Draw, ServiceError> {
        let room = self.load_room(room_id).await?;
        let Some(question_id) = room.current_question_id else {
            return Err(ServiceError::InvalidState(format!(
                "room `{room_id}` changed while drawing (now {})",
                room.status.as_str()
            )));
        };

        debug!(parent: &self.span, %room_id, %question_id, "lost concurrent draw");
        Ok(Draw {
            question: self.catalog.question(question_id).await?,
            index: room.current_question_index,
            fresh: false,
        })
    }

    fn first_turn(&self, room: &RoomEntity) -> Uuid {
        match room.guest_id {
            Some(guest) if self.rng.flip() => guest,
            _ => room.owner_id,
        }
    }

    async fn load_room(&self, room_id: Uuid) -> Result<RoomEntity, ServiceError> {
        self.rooms
            .find(room_id)
            .await?
            .ok_or_else(|| ServiceError::room_not_found(room_id))
    }
}

/// Next status for a player-driven event; an ignored event is a state error here.
fn required_transition(from: RoomStatus, event: RoomEvent) -> Result<RoomStatus, ServiceError> {
    match compute_transition(from, event)? {
        Transition::To(next) => Ok(next),
        Transition::Ignore => Err(ServiceError::InvalidState(format!(
            "{event:?} does not apply while {}",
            from.as_str()
        ))),
    }
}

fn ensure_playing(room: &RoomEntity, action: &str) -> Result<(), ServiceError> {
    if room.status == RoomStatus::Playing {
        return Ok(());
    }
    Err(ServiceError::InvalidState(format!(
        "cannot {action} while room `{}` is {}",
        room.id,
        room.status.as_str()
    )))
}

/// Clock steps backwards count as no time paused.
fn paused_for(paused_at: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(paused_at).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        dao::record_store::memory::MemoryRecordStore, dto::events::EventKind,
        state::clock::ManualClock,
    };

    struct Fixture {
        service: GameService,
        clock: ManualClock,
        owner: Uuid,
        guest: Uuid,
        category: Uuid,
    }

    async fn fixture(questions: usize) -> Fixture {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let clock = ManualClock::default();
        let service = GameService::new(
            store,
            EventBus::with_capacity(32),
            GameServiceOptions {
                clock: Arc::new(clock.clone()),
                rng: SharedRng::seeded(3),
                span: Span::none(),
            },
        );
        let category = Uuid::new_v4();
        for n in 0..questions {
            service
                .catalog()
                .add_question(category, "en".into(), format!("q{n}"))
                .await
                .unwrap();
        }
        Fixture {
            service,
            clock,
            owner: Uuid::new_v4(),
            guest: Uuid::new_v4(),
            category,
        }
    }

    impl Fixture {
        async fn playing_room(&self) -> Uuid {
            let room = self
                .service
                .create_room(self.owner, "en", vec![self.category], 0)
                .await
                .unwrap();
            self.service.join_room(room.id, self.guest).await.unwrap();
            self.service.start_game(room.id).await.unwrap();
            room.id
        }
    }

    #[tokio::test]
    async fn join_moves_room_to_ready_once() {
        let f = fixture(1).await;
        let room = f
            .service
            .create_room(f.owner, "en", vec![], 0)
            .await
            .unwrap();

        let joined = f.service.join_room(room.id, f.guest).await.unwrap();
        assert!(joined.applied);
        assert_eq!(joined.room.status, RoomStatus::Ready);

        let again = f.service.join_room(room.id, f.guest).await.unwrap();
        assert!(!again.applied);

        let intruder = f.service.join_room(room.id, Uuid::new_v4()).await;
        assert!(matches!(intruder, Err(ServiceError::InvalidState(_))));
        let owner = f.service.join_room(room.id, f.owner).await;
        assert!(matches!(owner, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let f = fixture(3).await;
        let room_id = f.playing_room().await;
        let err = f.service.start_game(room_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn unknown_action_is_rejected_before_any_write() {
        let f = fixture(2).await;
        let room_id = f.playing_room().await;

        let err = f
            .service
            .submit_answer(room_id, f.owner, "shrug", "hm".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(f.service.answer_count(room_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn passed_answer_drops_its_body() {
        let f = fixture(2).await;
        let room_id = f.playing_room().await;
        let mut events = f.service.bus().subscribe(Some(room_id), f.owner);

        let answer = f
            .service
            .submit_answer(room_id, f.guest, "passed", "ignored".into())
            .await
            .unwrap();
        assert_eq!(answer.body, "");

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::AnswerSubmitted);
        assert_eq!(event.data["action"], json!("passed"));
        assert_eq!(event.data["body"], json!(""));
    }

    #[tokio::test]
    async fn strangers_cannot_answer() {
        let f = fixture(2).await;
        let room_id = f.playing_room().await;
        let err = f
            .service
            .submit_answer(room_id, Uuid::new_v4(), "answered", "hi".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn retried_turn_change_flips_once() {
        let f = fixture(2).await;
        let room_id = f.playing_room().await;
        let holder = f.service.room(room_id).await.unwrap().room.current_turn.unwrap();

        let first = f.service.change_turn(room_id, Some(holder)).await.unwrap();
        let retry = f.service.change_turn(room_id, Some(holder)).await.unwrap();

        assert!(first.applied);
        assert!(!retry.applied);
        assert_ne!(retry.room.current_turn, Some(holder));
    }

    #[tokio::test]
    async fn question_limit_stops_fresh_draws_only() {
        let f = fixture(5).await;
        let room = f
            .service
            .create_room(f.owner, "en", vec![f.category], 1)
            .await
            .unwrap();
        let start = f.service.start_game(room.id).await.unwrap();

        // The in-flight question is still served.
        let again = f.service.draw_question(room.id).await.unwrap();
        assert_eq!(again.question, start.draw.question);

        f.service.change_turn(room.id, None).await.unwrap();
        let err = f.service.draw_question(room.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::QuestionLimitReached { max: 1 }));
    }

    #[tokio::test]
    async fn timeout_check_uses_strictly_greater_than() {
        let f = fixture(2).await;
        let room_id = f.playing_room().await;
        f.service.pause_game(room_id, f.guest).await.unwrap();

        f.clock.advance(Duration::from_secs(60));
        let at_limit = f
            .service
            .check_reconnection_timeout(room_id, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(at_limit, ReconnectionCheck::NotTimedOut);

        f.clock.advance(Duration::from_millis(1));
        let past_limit = f
            .service
            .check_reconnection_timeout(room_id, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(past_limit, ReconnectionCheck::TimedOut);
    }

    #[tokio::test]
    async fn pause_by_stranger_is_rejected() {
        let f = fixture(2).await;
        let room_id = f.playing_room().await;
        let err = f
            .service
            .pause_game(room_id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn pause_outside_playing_ignores_who_is_named() {
        let f = fixture(1).await;
        let room = f
            .service
            .create_room(f.owner, "en", vec![f.category], 0)
            .await
            .unwrap();

        let change = f.service.pause_game(room.id, Uuid::new_v4()).await.unwrap();
        assert!(!change.applied);
        assert_eq!(change.room.status, RoomStatus::Waiting);
    }
}
