/// Time source.
pub mod clock;
/// In-process event fan-out.
pub mod event_bus;
/// Shared random number generator.
pub mod random;
mod room;
/// Room lifecycle transitions.
pub mod state_machine;

use std::sync::Arc;

use tracing::info_span;

use crate::{
    config::AppConfig,
    dao::record_store::RecordStore,
    services::game_service::{GameService, GameServiceOptions},
};

use self::{clock::SystemClock, event_bus::EventBus, random::SharedRng};

/// Reference-counted application state.
pub type SharedState = Arc<AppState>;

/// Central application state shared by every request handler.
pub struct AppState {
    store: Arc<dyn RecordStore>,
    bus: EventBus,
    games: GameService,
    config: AppConfig,
}

impl AppState {
    /// Wire the event bus and game service on top of `store`, wrapped in an [`Arc`].
    pub fn new(store: Arc<dyn RecordStore>, config: AppConfig) -> SharedState {
        let bus = EventBus::new(config.subscriber_queue_capacity, info_span!("event_bus"));
        let games = GameService::new(
            store.clone(),
            bus.clone(),
            GameServiceOptions {
                clock: Arc::new(SystemClock),
                rng: SharedRng::from_seed(config.rng_seed),
                span: info_span!("game_service"),
            },
        );
        Self::with_games(store, bus, games, config)
    }

    /// Assemble the state from pre-built parts, e.g. a service with a manual clock.
    pub fn with_games(
        store: Arc<dyn RecordStore>,
        bus: EventBus,
        games: GameService,
        config: AppConfig,
    ) -> SharedState {
        Arc::new(Self {
            store,
            bus,
            games,
            config,
        })
    }

    /// Record store backing every repository.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// In-process fan-out feeding the SSE streams.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Game orchestrator.
    pub fn games(&self) -> &GameService {
        &self.games
    }

    /// Loaded configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
