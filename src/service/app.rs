//! Application state and service coordination
//!
//! One [`AppState`] per process: it owns every component, wires them
//! together according to the configuration, and manages the background
//! tasks (sweeper, admin push, pooled dispatcher drain, health server).

use crate::admin::AdminFeed;
use crate::config::{AppConfig, CoordinationBackend, DispatchMode};
use crate::coord::{ActorCoordStore, CoordinationStore, LockingCoordStore};
use crate::error::Result;
use crate::limiter::RateLimiter;
use crate::matchmaking::{
    DirectDispatcher, ExpirySweeper, MatchDispatcher, MatchmakingEngine, PooledDispatcher,
};
use crate::metrics::{HealthServer, HealthServerConfig, MetricsAggregator, MetricsCollector};
use crate::room::{RelayService, RoomLifecycle};
use crate::service::handlers::ChatHandlers;
use crate::session::SessionRegistry;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Everything one process needs to run the chat engine
pub struct AppState {
    config: AppConfig,
    handlers: Arc<ChatHandlers>,
    sessions: Arc<SessionRegistry>,
    rooms: Arc<RoomLifecycle>,
    admin: Arc<AdminFeed>,
    aggregator: Arc<MetricsAggregator>,
    collector: Arc<MetricsCollector>,
    health: Arc<HealthServer>,
    background_tasks: Vec<JoinHandle<()>>,
}

impl AppState {
    /// Build and wire every component. Nothing runs yet; call
    /// [`AppState::start`] for the background tasks.
    pub async fn new(config: AppConfig) -> Result<Self> {
        let store: Arc<dyn CoordinationStore> = match config.matchmaking.backend {
            CoordinationBackend::Locking => Arc::new(LockingCoordStore::new()),
            CoordinationBackend::Actor => Arc::new(ActorCoordStore::spawn()),
        };
        info!(
            "Coordination backend: {:?}, dispatch: {:?}",
            config.matchmaking.backend, config.matchmaking.dispatch
        );

        let sessions = Arc::new(SessionRegistry::new());
        let aggregator = Arc::new(MetricsAggregator::new());
        let collector = Arc::new(MetricsCollector::new()?);
        let limiter = Arc::new(RateLimiter::new());

        let rooms = Arc::new(RoomLifecycle::new(
            sessions.clone(),
            store.clone(),
            aggregator.clone(),
            &config,
        ));
        let relay = Arc::new(RelayService::new(rooms.clone(), sessions.clone()));
        let engine = Arc::new(MatchmakingEngine::new(
            store.clone(),
            sessions.clone(),
            rooms.clone(),
            config.pairing_lock_ttl(),
        ));
        let admin = Arc::new(AdminFeed::new(
            aggregator.clone(),
            config.service.admin_token.clone(),
        ));

        let mut background_tasks = Vec::new();
        let dispatcher: Arc<dyn MatchDispatcher> = match config.matchmaking.dispatch {
            DispatchMode::Direct => Arc::new(DirectDispatcher::new(engine.clone())),
            DispatchMode::Pooled => {
                let (dispatcher, drain) =
                    PooledDispatcher::start(engine.clone(), config.matchmaking.match_concurrency);
                background_tasks.push(drain);
                Arc::new(dispatcher)
            }
        };

        let handlers = Arc::new(ChatHandlers::new(
            config.clone(),
            sessions.clone(),
            store,
            rooms.clone(),
            relay,
            engine,
            dispatcher,
            limiter,
            aggregator.clone(),
            admin.clone(),
        ));

        let health = Arc::new(HealthServer::new(
            HealthServerConfig {
                port: config.service.health_port,
                host: "0.0.0.0".to_string(),
            },
            aggregator.clone(),
            collector.clone(),
        ));

        Ok(Self {
            config,
            handlers,
            sessions,
            rooms,
            admin,
            aggregator,
            collector,
            health,
            background_tasks,
        })
    }

    /// Start the sweeper, admin push, and health server tasks.
    pub fn start(&mut self) -> Result<()> {
        let sweeper = ExpirySweeper::new(
            self.rooms.clone(),
            self.admin.clone(),
            self.config.sweep_interval(),
        );
        self.background_tasks.push(sweeper.start());

        self.background_tasks.push(
            self.admin
                .clone()
                .start_push_task(self.config.metrics_push_interval()),
        );

        let health = self.health.clone();
        self.background_tasks.push(tokio::spawn(async move {
            if let Err(e) = health.start().await {
                error!("Health server failed: {}", e);
            }
        }));

        info!("Service components started");
        Ok(())
    }

    /// Stop the health server and abort every background task.
    pub async fn shutdown(&mut self) {
        info!("Stopping service components...");
        self.health.stop();

        for task in self.background_tasks.drain(..) {
            task.abort();
        }
        info!("Service components stopped");
    }

    /// The operation surface the transport adapter calls.
    pub fn handlers(&self) -> Arc<ChatHandlers> {
        self.handlers.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn online_count(&self) -> usize {
        self.sessions.online_count()
    }

    pub fn active_room_count(&self) -> usize {
        self.rooms.active_count()
    }

    pub fn metrics(&self) -> Arc<MetricsAggregator> {
        self.aggregator.clone()
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }
}
