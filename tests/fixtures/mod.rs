//! Test fixtures and mock implementations for integration testing

use async_trait::async_trait;
use duet_room::admin::AdminFeed;
use duet_room::config::AppConfig;
use duet_room::coord::{CoordinationStore, LockingCoordStore};
use duet_room::error::{ErrorCode, Result};
use duet_room::limiter::RateLimiter;
use duet_room::matchmaking::{DirectDispatcher, MatchmakingEngine};
use duet_room::metrics::MetricsAggregator;
use duet_room::room::{RelayService, RoomLifecycle};
use duet_room::service::ChatHandlers;
use duet_room::session::{EventSink, SessionRegistry};
use duet_room::types::{EndReason, ServerEvent, UserId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Event sink that records everything delivered to it
#[derive(Debug, Default)]
pub struct RecordingSink {
    connected: AtomicBool,
    closed: AtomicBool,
    events: Mutex<Vec<ServerEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            events: Mutex::new(Vec::new()),
        })
    }

    /// Get all delivered events (for testing)
    pub fn events(&self) -> Vec<ServerEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Event kind tags in delivery order
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(|event| event.kind()).collect()
    }

    /// Count events of a specific kind
    pub fn count_events_of_kind(&self, kind: &str) -> usize {
        self.events()
            .iter()
            .filter(|event| event.kind() == kind)
            .count()
    }

    pub fn matched_partner(&self) -> Option<UserId> {
        self.events().into_iter().find_map(|event| match event {
            ServerEvent::RoomMatched { partner_id, .. } => Some(partner_id),
            _ => None,
        })
    }

    pub fn ended_reasons(&self) -> Vec<EndReason> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ServerEvent::RoomEnded { reason } => Some(reason),
                _ => None,
            })
            .collect()
    }

    pub fn error_codes(&self) -> Vec<ErrorCode> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ServerEvent::SystemError { code, .. } => Some(code),
                _ => None,
            })
            .collect()
    }

    /// Simulate the transport dropping the connection.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn deliver(&self, event: ServerEvent) -> Result<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// A fully wired engine with inline (direct) match dispatch, so tests see
/// pairing results synchronously.
pub struct TestSystem {
    pub config: AppConfig,
    pub sessions: Arc<SessionRegistry>,
    pub store: Arc<dyn CoordinationStore>,
    pub rooms: Arc<RoomLifecycle>,
    pub metrics: Arc<MetricsAggregator>,
    pub admin: Arc<AdminFeed>,
    pub handlers: Arc<ChatHandlers>,
}

impl TestSystem {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let sessions = Arc::new(SessionRegistry::new());
        let store: Arc<dyn CoordinationStore> = Arc::new(LockingCoordStore::new());
        let metrics = Arc::new(MetricsAggregator::new());
        let rooms = Arc::new(RoomLifecycle::new(
            sessions.clone(),
            store.clone(),
            metrics.clone(),
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
            metrics.clone(),
            config.service.admin_token.clone(),
        ));
        let dispatcher = Arc::new(DirectDispatcher::new(engine.clone()));
        let limiter = Arc::new(RateLimiter::new());

        let handlers = Arc::new(ChatHandlers::new(
            config.clone(),
            sessions.clone(),
            store.clone(),
            rooms.clone(),
            relay,
            engine,
            dispatcher,
            limiter,
            metrics.clone(),
            admin.clone(),
        ));

        Self {
            config,
            sessions,
            store,
            rooms,
            metrics,
            admin,
            handlers,
        }
    }

    /// Accept a connection from a unique client address, so per-ip rate
    /// limits in unrelated tests never interfere.
    pub fn connect(&self) -> (UserId, Arc<RecordingSink>) {
        static NEXT_IP: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(1);
        let host = NEXT_IP.fetch_add(1, Ordering::SeqCst);
        self.connect_from(&format!("10.0.{}.{}", host / 256, host % 256))
    }

    /// Accept a connection from a specific client address.
    pub fn connect_from(&self, ip: &str) -> (UserId, Arc<RecordingSink>) {
        let sink = RecordingSink::new();
        let user_id = self
            .handlers
            .connect(sink.clone(), ip.to_string())
            .expect("register session");
        (user_id, sink)
    }
}
