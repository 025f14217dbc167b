use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::{
    error::ServiceError,
    services::game_service::{GameService, ReconnectionCheck},
};

/// Counts from one sweep over the paused rooms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Paused rooms inspected.
    pub checked: usize,
    /// Rooms finished for timeout.
    pub timed_out: usize,
    /// Rooms whose check failed.
    pub failed: usize,
}

/// Run [`GameService::check_reconnection_timeout`] on every paused room once.
///
/// A failure on one room is logged and does not stop the sweep.
pub async fn sweep_once(games: &GameService, limit: Duration) -> Result<SweepReport, ServiceError> {
    let mut report = SweepReport::default();
    for room in games.paused_rooms().await? {
        report.checked += 1;
        match games.check_reconnection_timeout(room.id, limit).await {
            Ok(ReconnectionCheck::TimedOut) => report.timed_out += 1,
            Ok(_) => {}
            Err(err) => {
                report.failed += 1;
                warn!(room_id = %room.id, error = %err, "reconnection check failed");
            }
        }
    }
    Ok(report)
}

/// Sweep paused rooms every `every` until the task is dropped.
pub async fn run(games: GameService, limit: Duration, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match sweep_once(&games, limit).await {
            Ok(report) if report.timed_out > 0 => {
                info!(
                    checked = report.checked,
                    timed_out = report.timed_out,
                    failed = report.failed,
                    "reconnection sweep finished rooms"
                );
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "failed to list paused rooms; retrying next tick"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tracing::Span;
    use uuid::Uuid;

    use super::*;
    use crate::{
        dao::{models::RoomStatus, record_store::memory::MemoryRecordStore},
        services::game_service::GameServiceOptions,
        state::{clock::ManualClock, event_bus::EventBus, random::SharedRng},
    };

    #[tokio::test]
    async fn sweep_finishes_only_expired_rooms() {
        let clock = ManualClock::default();
        let games = GameService::new(
            Arc::new(MemoryRecordStore::new()),
            EventBus::default(),
            GameServiceOptions {
                clock: Arc::new(clock.clone()),
                rng: SharedRng::seeded(5),
                span: Span::none(),
            },
        );
        let category = Uuid::new_v4();
        games
            .catalog()
            .add_question(category, "en".into(), "first".into())
            .await
            .unwrap();

        let mut rooms = Vec::new();
        for _ in 0..2 {
            let owner = Uuid::new_v4();
            let room = games.create_room(owner, "en", vec![], 0).await.unwrap();
            games.start_game(room.id).await.unwrap();
            rooms.push((room.id, owner));
        }

        games.pause_game(rooms[0].0, rooms[0].1).await.unwrap();
        clock.advance(Duration::from_secs(120));
        games.pause_game(rooms[1].0, rooms[1].1).await.unwrap();

        let report = sweep_once(&games, Duration::from_secs(60)).await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                checked: 2,
                timed_out: 1,
                failed: 0
            }
        );

        assert_eq!(
            games.room(rooms[0].0).await.unwrap().room.status,
            RoomStatus::Finished
        );
        assert_eq!(
            games.room(rooms[1].0).await.unwrap().room.status,
            RoomStatus::Paused
        );
    }
}
