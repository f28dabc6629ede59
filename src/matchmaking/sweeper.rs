//! Expiry sweeper
//!
//! The only source of time-based room termination. One task, concurrency 1;
//! each tick sweeps expired rooms and then pushes a metrics broadcast so
//! admin dashboards see terminations promptly.

use crate::admin::AdminFeed;
use crate::room::RoomLifecycle;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Periodic idle/over-duration room terminator
pub struct ExpirySweeper {
    rooms: Arc<RoomLifecycle>,
    admin: Arc<AdminFeed>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(rooms: Arc<RoomLifecycle>, admin: Arc<AdminFeed>, interval: Duration) -> Self {
        Self {
            rooms,
            admin,
            interval,
        }
    }

    /// Run one sweep-and-broadcast cycle.
    pub async fn tick(&self) {
        match self.rooms.sweep_expired().await {
            Ok(ended) if ended > 0 => debug!("Sweeper ended {} rooms", ended),
            Ok(_) => {}
            Err(e) => error!("Room sweep failed: {}", e),
        }
        self.admin.broadcast().await;
    }

    /// Start the periodic sweep task.
    pub fn start(self) -> JoinHandle<()> {
        info!("Starting expiry sweeper (every {:?})", self.interval);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::coord::{CoordinationStore, LockingCoordStore};
    use crate::error::Result as ChatResult;
    use crate::metrics::MetricsAggregator;
    use crate::session::{EventSink, SessionRegistry};
    use crate::types::ServerEvent;
    use async_trait::async_trait;

    struct NullSink;

    #[async_trait]
    impl EventSink for NullSink {
        async fn deliver(&self, _event: ServerEvent) -> ChatResult<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn test_tick_sweeps_and_survives_empty_registry() {
        let config = AppConfig::default();
        let sessions = Arc::new(SessionRegistry::new());
        let store: Arc<dyn CoordinationStore> = Arc::new(LockingCoordStore::new());
        let metrics = Arc::new(MetricsAggregator::new());
        let rooms = Arc::new(RoomLifecycle::new(
            sessions.clone(),
            store,
            metrics.clone(),
            &config,
        ));
        let admin = Arc::new(AdminFeed::new(metrics, "token".to_string()));

        let sweeper = ExpirySweeper::new(rooms.clone(), admin, config.sweep_interval());

        // Nothing to sweep; the tick must still complete.
        sweeper.tick().await;

        let a = sessions.register(Arc::new(NullSink), "ip".into()).unwrap();
        let b = sessions.register(Arc::new(NullSink), "ip".into()).unwrap();
        let room = rooms.create(a, b).unwrap().unwrap();
        rooms.backdate(room.room_id, 120, 90);

        sweeper.tick().await;
        assert_eq!(rooms.active_count(), 0);
    }
}
