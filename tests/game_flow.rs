use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use duo_cards_back::{
    dao::{
        models::RoomStatus,
        question::QuestionRepository,
        record_store::{
            Filter, Pagination, Record, RecordStore, Table, memory::MemoryRecordStore,
        },
        storage::{StorageError, StorageResult},
    },
    dto::events::{EventKind, RealtimeEvent},
    error::ServiceError,
    services::{
        game_service::{GameService, GameServiceOptions, ReconnectionCheck},
        notifications::YOUR_TURN_MESSAGE,
    },
    state::{
        clock::ManualClock,
        event_bus::{EventBus, Subscription},
        random::SharedRng,
    },
};
use futures::{FutureExt, future::BoxFuture};
use serde_json::json;
use tracing::Span;
use uuid::Uuid;

/// Memory store whose writes, or only its conditional updates, can be switched to fail.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryRecordStore,
    fail_writes: Arc<AtomicBool>,
    fail_conditional: Arc<AtomicBool>,
}

fn offline<T: Send + 'static>() -> BoxFuture<'static, StorageResult<T>> {
    futures::future::ready(Err(StorageError::unavailable(
        "injected write failure".into(),
        std::io::Error::other("store offline"),
    )))
    .boxed()
}

impl FlakyStore {
    fn write_guard<T: Send + 'static>(&self) -> Option<BoxFuture<'static, StorageResult<T>>> {
        self.fail_writes.load(Ordering::SeqCst).then(offline)
    }
}

impl RecordStore for FlakyStore {
    fn get_by_id(&self, table: Table, id: Uuid) -> BoxFuture<'static, StorageResult<Option<Record>>> {
        self.inner.get_by_id(table, id)
    }

    fn list(
        &self,
        table: Table,
        filters: Vec<Filter>,
        page: Pagination,
    ) -> BoxFuture<'static, StorageResult<Vec<Record>>> {
        self.inner.list(table, filters, page)
    }

    fn count(&self, table: Table, filters: Vec<Filter>) -> BoxFuture<'static, StorageResult<usize>> {
        self.inner.count(table, filters)
    }

    fn insert(&self, table: Table, record: Record) -> BoxFuture<'static, StorageResult<()>> {
        self.write_guard()
            .unwrap_or_else(|| self.inner.insert(table, record))
    }

    fn update(&self, table: Table, id: Uuid, fields: Record) -> BoxFuture<'static, StorageResult<bool>> {
        self.write_guard()
            .unwrap_or_else(|| self.inner.update(table, id, fields))
    }

    fn update_if(
        &self,
        table: Table,
        id: Uuid,
        guards: Vec<Filter>,
        fields: Record,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        if self.fail_conditional.load(Ordering::SeqCst) {
            return offline();
        }
        self.write_guard()
            .unwrap_or_else(|| self.inner.update_if(table, id, guards, fields))
    }

    fn delete_matching(
        &self,
        table: Table,
        filters: Vec<Filter>,
    ) -> BoxFuture<'static, StorageResult<usize>> {
        self.write_guard()
            .unwrap_or_else(|| self.inner.delete_matching(table, filters))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }
}

struct Harness {
    games: GameService,
    store: FlakyStore,
    clock: ManualClock,
    category: Uuid,
}

impl Harness {
    async fn new(questions: usize) -> Self {
        let store = FlakyStore::default();
        let clock = ManualClock::default();
        let games = GameService::new(
            Arc::new(store.clone()),
            EventBus::with_capacity(64),
            GameServiceOptions {
                clock: Arc::new(clock.clone()),
                rng: SharedRng::seeded(2024),
                span: Span::none(),
            },
        );
        let harness = Self {
            games,
            store,
            clock,
            category: Uuid::new_v4(),
        };
        harness.seed(harness.category, "en", questions).await;
        harness
    }

    async fn seed(&self, category: Uuid, language: &str, count: usize) {
        for n in 0..count {
            self.games
                .catalog()
                .add_question(category, language.into(), format!("{language} question {n}"))
                .await
                .unwrap();
        }
    }

    async fn room(&self, owner: Uuid, guest: Option<Uuid>) -> Uuid {
        let room = self
            .games
            .create_room(owner, "en", vec![self.category], 0)
            .await
            .unwrap();
        if let Some(guest) = guest {
            self.games.join_room(room.id, guest).await.unwrap();
        }
        room.id
    }

    /// Subscription of a spectator, so user-addressed notifications stay out of it.
    fn watch(&self, room_id: Uuid) -> Subscription {
        self.games.bus().subscribe(Some(room_id), Uuid::new_v4())
    }

    fn history(&self) -> QuestionRepository {
        QuestionRepository::new(Arc::new(self.store.clone()))
    }
}

fn drain(subscription: &mut Subscription) -> Vec<RealtimeEvent> {
    std::iter::from_fn(|| subscription.try_recv()).collect()
}

fn kinds(events: &[RealtimeEvent]) -> Vec<EventKind> {
    events.iter().map(|event| event.kind).collect()
}

#[tokio::test]
async fn owner_only_room_starts_with_owner_turn_and_one_draw() {
    let h = Harness::new(5).await;
    let owner = Uuid::new_v4();
    let room_id = h.room(owner, None).await;
    let mut events = h.watch(room_id);

    let start = h.games.start_game(room_id).await.unwrap();

    assert_eq!(start.room.status, RoomStatus::Playing);
    assert_eq!(start.room.current_turn, Some(owner));
    assert!(start.draw.fresh);
    assert_eq!(start.draw.index, 1);
    assert_eq!(
        kinds(&drain(&mut events)),
        vec![EventKind::GameStarted, EventKind::QuestionDrawn]
    );
}

#[tokio::test]
async fn owner_only_room_keeps_the_owner_turn() {
    let h = Harness::new(5).await;
    let owner = Uuid::new_v4();
    let room_id = h.room(owner, None).await;
    h.games.start_game(room_id).await.unwrap();

    for _ in 0..3 {
        let change = h.games.change_turn(room_id, None).await.unwrap();
        assert_eq!(change.room.current_turn, Some(owner));
    }
}

#[tokio::test]
async fn five_rounds_alternate_turns_and_record_answers() {
    let h = Harness::new(10).await;
    let (owner, guest) = (Uuid::new_v4(), Uuid::new_v4());
    let room_id = h.room(owner, Some(guest)).await;
    let mut events = h.watch(room_id);

    let start = h.games.start_game(room_id).await.unwrap();
    let mut holder = start.room.current_turn.unwrap();
    assert!(holder == owner || holder == guest);

    let mut asked = HashSet::new();
    for round in 0..5 {
        let draw = h.games.draw_question(room_id).await.unwrap();
        assert_eq!(draw.index, round + 1);
        assert!(asked.insert(draw.question.id), "question repeated");

        h.games
            .submit_answer(room_id, holder, "answered", format!("answer {round}"))
            .await
            .unwrap();

        let change = h.games.change_turn(room_id, Some(holder)).await.unwrap();
        let next = change.room.current_turn.unwrap();
        assert_ne!(next, holder, "turn must alternate");
        assert_eq!(change.room.current_question_id, None);
        holder = next;
    }

    let view = h.games.room(room_id).await.unwrap();
    assert_eq!(view.room.current_question_index, 5);
    assert_eq!(h.games.answer_count(room_id).await.unwrap(), 5);

    let answers = h.games.list_answers(room_id).await.unwrap();
    let bodies: Vec<_> = answers.iter().map(|answer| answer.body.as_str()).collect();
    assert_eq!(
        bodies,
        vec!["answer 0", "answer 1", "answer 2", "answer 3", "answer 4"]
    );

    let published = kinds(&drain(&mut events));
    let count = |kind| published.iter().filter(|k| **k == kind).count();
    assert_eq!(count(EventKind::QuestionDrawn), 5);
    assert_eq!(count(EventKind::AnswerSubmitted), 5);
    assert_eq!(count(EventKind::TurnChanged), 5);
}

#[tokio::test]
async fn paused_room_times_out_only_after_the_limit() {
    let h = Harness::new(3).await;
    let (owner, guest) = (Uuid::new_v4(), Uuid::new_v4());
    let room_id = h.room(owner, Some(guest)).await;
    h.games.start_game(room_id).await.unwrap();
    let mut events = h.watch(room_id);
    let limit = Duration::from_secs(5 * 60);

    h.games.pause_game(room_id, guest).await.unwrap();

    h.clock.advance(Duration::from_secs(60));
    let early = h
        .games
        .check_reconnection_timeout(room_id, limit)
        .await
        .unwrap();
    assert_eq!(early, ReconnectionCheck::NotTimedOut);
    assert_eq!(
        h.games.room(room_id).await.unwrap().room.status,
        RoomStatus::Paused
    );

    h.clock.advance(Duration::from_secs(5 * 60));
    let late = h
        .games
        .check_reconnection_timeout(room_id, limit)
        .await
        .unwrap();
    assert_eq!(late, ReconnectionCheck::TimedOut);

    let room = h.games.room(room_id).await.unwrap().room;
    assert_eq!(room.status, RoomStatus::Finished);
    assert_eq!(room.paused_at, None);
    assert_eq!(room.disconnected_party, None);

    let published = drain(&mut events);
    assert_eq!(
        kinds(&published),
        vec![EventKind::GamePaused, EventKind::GameFinished]
    );
    assert_eq!(published[1].data["reason"], json!("reconnection_timeout"));

    // Already finished: nothing left to time out.
    let again = h
        .games
        .check_reconnection_timeout(room_id, limit)
        .await
        .unwrap();
    assert_eq!(again, ReconnectionCheck::NotPaused);
}

#[tokio::test]
async fn fourth_draw_from_a_three_question_category_is_exhausted() {
    let h = Harness::new(3).await;
    h.seed(Uuid::new_v4(), "en", 4).await;
    h.seed(h.category, "de", 4).await;

    let owner = Uuid::new_v4();
    let room_id = h.room(owner, None).await;
    h.games.start_game(room_id).await.unwrap();
    for _ in 0..2 {
        h.games.change_turn(room_id, None).await.unwrap();
        h.games.draw_question(room_id).await.unwrap();
    }
    h.games.change_turn(room_id, None).await.unwrap();

    let err = h.games.draw_question(room_id).await.unwrap_err();
    match &err {
        ServiceError::QuestionsExhausted {
            language,
            categories,
        } => {
            assert_eq!(language, "en");
            assert_eq!(categories, &vec![h.category]);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("en"), "{message}");
    assert!(message.contains(&h.category.to_string()), "{message}");
}

#[tokio::test]
async fn repeated_draw_returns_the_same_question_with_one_history_entry() {
    let h = Harness::new(5).await;
    let owner = Uuid::new_v4();
    let room_id = h.room(owner, None).await;
    let start = h.games.start_game(room_id).await.unwrap();
    let mut events = h.watch(room_id);

    let first = h.games.draw_question(room_id).await.unwrap();
    let second = h.games.draw_question(room_id).await.unwrap();

    assert_eq!(first.question, start.draw.question);
    assert_eq!(second.question, start.draw.question);
    assert!(!first.fresh && !second.fresh);
    assert_eq!(h.history().history_len(room_id).await.unwrap(), 1);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_draws_agree_on_a_single_question() {
    let h = Harness::new(20).await;
    let owner = Uuid::new_v4();
    let room_id = h.room(owner, None).await;
    h.games.start_game(room_id).await.unwrap();
    h.games.change_turn(room_id, None).await.unwrap();
    let mut events = h.watch(room_id);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let games = h.games.clone();
            tokio::spawn(async move { games.draw_question(room_id).await })
        })
        .collect();

    let mut draws = Vec::new();
    for task in tasks {
        draws.push(task.await.unwrap().unwrap());
    }

    let ids: HashSet<_> = draws.iter().map(|draw| draw.question.id).collect();
    assert_eq!(ids.len(), 1, "every caller sees the winning question");
    assert_eq!(draws.iter().filter(|draw| draw.fresh).count(), 1);
    assert_eq!(
        h.games.room(room_id).await.unwrap().room.current_question_index,
        2
    );

    // Losing draws released their entries: the first question plus the winner remain.
    let asked = h.history().asked_question_ids(room_id).await.unwrap();
    let unique: HashSet<_> = asked.iter().collect();
    assert_eq!(unique.len(), asked.len(), "history holds duplicates");
    assert_eq!(asked.len(), 2);

    let drawn = drain(&mut events)
        .into_iter()
        .filter(|event| event.kind == EventKind::QuestionDrawn)
        .count();
    assert_eq!(drawn, 1);
}

#[tokio::test]
async fn duplicate_history_inserts_keep_a_single_entry() {
    let h = Harness::new(1).await;
    let history = h.history();
    let (room_id, question_id) = (Uuid::new_v4(), Uuid::new_v4());

    let (left, right) = tokio::join!(
        history.record_asked(room_id, question_id),
        history.record_asked(room_id, question_id)
    );
    let conflicts = [&left, &right]
        .iter()
        .filter(|result| matches!(result, Err(err) if err.is_conflict()))
        .count();
    assert_eq!(conflicts, 1);
    assert_eq!(
        history.asked_question_ids(room_id).await.unwrap(),
        vec![question_id]
    );
}

#[tokio::test]
async fn store_failure_aborts_without_publishing() {
    let h = Harness::new(5).await;
    let (owner, guest) = (Uuid::new_v4(), Uuid::new_v4());
    let room_id = h.room(owner, Some(guest)).await;
    let start = h.games.start_game(room_id).await.unwrap();
    let holder = start.room.current_turn.unwrap();
    let mut events = h.watch(room_id);

    h.store.fail_writes.store(true, Ordering::SeqCst);

    let turn = h.games.change_turn(room_id, None).await;
    assert!(matches!(
        turn,
        Err(ServiceError::Storage(StorageError::Unavailable { .. }))
    ));
    let answer = h
        .games
        .submit_answer(room_id, holder, "answered", "yes".into())
        .await;
    assert!(matches!(answer, Err(ServiceError::Storage(_))));
    let pause = h.games.pause_game(room_id, guest).await;
    assert!(matches!(pause, Err(ServiceError::Storage(_))));
    let end = h.games.end_game(room_id).await;
    assert!(matches!(end, Err(ServiceError::Storage(_))));

    // Give detached notification tasks a chance to run before checking.
    tokio::task::yield_now().await;
    assert!(drain(&mut events).is_empty());

    h.store.fail_writes.store(false, Ordering::SeqCst);
    let room = h.games.room(room_id).await.unwrap().room;
    assert_eq!(room.status, RoomStatus::Playing);
    assert_eq!(room.current_turn, Some(holder));
    assert_eq!(room.current_question_id, Some(start.draw.question.id));
    assert_eq!(h.games.answer_count(room_id).await.unwrap(), 0);
}

#[tokio::test]
async fn start_without_questions_leaves_the_room_waiting() {
    let h = Harness::new(0).await;
    let owner = Uuid::new_v4();
    let room_id = h.room(owner, None).await;
    let mut events = h.watch(room_id);

    let err = h.games.start_game(room_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::QuestionsExhausted { .. }));

    let room = h.games.room(room_id).await.unwrap().room;
    assert_eq!(room.status, RoomStatus::Waiting);
    assert_eq!(room.current_turn, None);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn failed_start_commit_keeps_the_only_question_drawable() {
    let h = Harness::new(1).await;
    let (owner, guest) = (Uuid::new_v4(), Uuid::new_v4());
    let room_id = h.room(owner, Some(guest)).await;
    let mut events = h.watch(room_id);

    h.store.fail_conditional.store(true, Ordering::SeqCst);
    let err = h.games.start_game(room_id).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Storage(StorageError::Unavailable { .. })
    ));
    assert_eq!(h.history().history_len(room_id).await.unwrap(), 0);
    assert_eq!(
        h.games.room(room_id).await.unwrap().room.status,
        RoomStatus::Ready
    );
    assert!(drain(&mut events).is_empty());

    h.store.fail_conditional.store(false, Ordering::SeqCst);
    let start = h.games.start_game(room_id).await.unwrap();
    assert_eq!(start.draw.index, 1);
    assert_eq!(h.history().history_len(room_id).await.unwrap(), 1);
}

#[tokio::test]
async fn failed_draw_commit_does_not_burn_the_question() {
    let h = Harness::new(2).await;
    let owner = Uuid::new_v4();
    let room_id = h.room(owner, None).await;
    h.games.start_game(room_id).await.unwrap();
    h.games.change_turn(room_id, None).await.unwrap();

    h.store.fail_conditional.store(true, Ordering::SeqCst);
    let err = h.games.draw_question(room_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Storage(_)));
    assert_eq!(h.history().history_len(room_id).await.unwrap(), 1);

    h.store.fail_conditional.store(false, Ordering::SeqCst);
    let draw = h.games.draw_question(room_id).await.unwrap();
    assert!(draw.fresh);
    assert_eq!(draw.index, 2);

    h.games.change_turn(room_id, None).await.unwrap();
    let err = h.games.draw_question(room_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::QuestionsExhausted { .. }));
}

#[tokio::test]
async fn pause_and_resume_keep_bookkeeping_consistent() {
    let h = Harness::new(3).await;
    let (owner, guest) = (Uuid::new_v4(), Uuid::new_v4());
    let room_id = h.room(owner, Some(guest)).await;

    // Connectivity signals before the game starts are ignored, whoever they name.
    let early = h.games.pause_game(room_id, guest).await.unwrap();
    assert!(!early.applied);
    assert_eq!(early.room.status, RoomStatus::Ready);
    let stray = h.games.pause_game(room_id, Uuid::new_v4()).await.unwrap();
    assert!(!stray.applied);

    h.games.start_game(room_id).await.unwrap();
    let mut events = h.watch(room_id);

    let paused = h.games.pause_game(room_id, owner).await.unwrap();
    assert!(paused.applied);
    assert_eq!(paused.room.status, RoomStatus::Paused);
    assert_eq!(paused.room.disconnected_party, Some(owner));
    assert!(paused.room.paused_at.is_some());
    assert_eq!(paused.room.invariant_violation(), None);

    let duplicate = h.games.pause_game(room_id, guest).await.unwrap();
    assert!(!duplicate.applied);
    assert_eq!(duplicate.room.disconnected_party, Some(owner));

    let err = h.games.draw_question(room_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    let resumed = h.games.resume_game(room_id).await.unwrap();
    assert!(resumed.applied);
    assert_eq!(resumed.room.status, RoomStatus::Playing);
    assert_eq!(resumed.room.paused_at, None);
    assert_eq!(resumed.room.disconnected_party, None);

    assert!(!h.games.resume_game(room_id).await.unwrap().applied);
    let check = h
        .games
        .check_reconnection_timeout(room_id, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(check, ReconnectionCheck::NotPaused);
    assert_eq!(
        h.games.room(room_id).await.unwrap().room.status,
        RoomStatus::Playing
    );

    assert_eq!(
        kinds(&drain(&mut events)),
        vec![EventKind::GamePaused, EventKind::GameResumed]
    );
}

#[tokio::test]
async fn end_game_is_idempotent() {
    let h = Harness::new(3).await;
    let owner = Uuid::new_v4();
    let room_id = h.room(owner, None).await;
    let mut events = h.watch(room_id);

    assert!(h.games.end_game(room_id).await.unwrap().applied);
    assert!(!h.games.end_game(room_id).await.unwrap().applied);

    let published = drain(&mut events);
    assert_eq!(kinds(&published), vec![EventKind::GameFinished]);
    assert_eq!(published[0].data["reason"], json!("ended"));

    let err = h.games.start_game(room_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

/// Wait for the next "your turn" notification, skipping other user-addressed events.
async fn next_turn_notice(feed: &mut Subscription) -> RealtimeEvent {
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let event = feed.recv().await.expect("subscription open");
            if event.kind == EventKind::Notification
                && event.data["message"] == json!(YOUR_TURN_MESSAGE)
            {
                return event;
            }
        }
    })
    .await
    .expect("turn notification delivered")
}

#[tokio::test]
async fn turn_holder_is_notified_on_their_own_stream() {
    let h = Harness::new(3).await;
    let (owner, guest) = (Uuid::new_v4(), Uuid::new_v4());
    let mut owner_feed = h.games.bus().subscribe(None, owner);
    let mut guest_feed = h.games.bus().subscribe(None, guest);
    let room_id = h.room(owner, Some(guest)).await;

    let start = h.games.start_game(room_id).await.unwrap();
    let first = start.room.current_turn.unwrap();
    let change = h.games.change_turn(room_id, None).await.unwrap();
    let second = change.room.current_turn.unwrap();
    assert_ne!(first, second);

    let (first_feed, second_feed) = if first == owner {
        (&mut owner_feed, &mut guest_feed)
    } else {
        (&mut guest_feed, &mut owner_feed)
    };

    let notice = next_turn_notice(first_feed).await;
    assert_eq!(notice.data["room_id"], json!(room_id));
    let notice = next_turn_notice(second_feed).await;
    assert_eq!(notice.data["room_id"], json!(room_id));
}

#[tokio::test]
async fn missing_room_is_reported_as_not_found() {
    let h = Harness::new(1).await;
    let err = h.games.draw_question(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}
