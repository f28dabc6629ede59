//! Admin metrics feed
//!
//! Admin connections subscribe with a shared secret; authorized
//! subscribers receive a metrics snapshot immediately and on every push
//! tick. A token mismatch reports an error and force-closes the channel.

use crate::error::{ChatError, Result};
use crate::metrics::MetricsAggregator;
use crate::session::EventSink;
use crate::types::ServerEvent;
use crate::utils::constant_time_eq;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Identifier handed back to the transport for an authorized admin channel
pub type AdminId = Uuid;

/// Push feed of metrics snapshots for admin connections
pub struct AdminFeed {
    subscribers: RwLock<HashMap<AdminId, Arc<dyn EventSink>>>,
    metrics: Arc<MetricsAggregator>,
    admin_token: String,
}

impl AdminFeed {
    pub fn new(metrics: Arc<MetricsAggregator>, admin_token: String) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            metrics,
            admin_token,
        }
    }

    /// Authorize and register an admin channel.
    ///
    /// The token is compared in constant time. On mismatch the channel gets
    /// an error event, is force-closed, and `None` comes back.
    pub async fn subscribe(&self, sink: Arc<dyn EventSink>, token: &str) -> Result<Option<AdminId>> {
        if !constant_time_eq(token, &self.admin_token) {
            if let Err(error) = sink
                .deliver(ServerEvent::SystemError {
                    code: crate::error::ErrorCode::BadRequest,
                    message: "Invalid admin token.".to_string(),
                })
                .await
            {
                debug!("Failed to report admin-token mismatch: {}", error);
            }
            sink.close().await;
            return Ok(None);
        }

        let admin_id = Uuid::new_v4();
        self.write()?.insert(admin_id, sink.clone());
        info!("Admin {} subscribed to metrics feed", admin_id);

        if let Err(error) = sink
            .deliver(ServerEvent::AdminMetrics(self.metrics.snapshot()))
            .await
        {
            debug!("Initial admin snapshot delivery failed: {}", error);
        }
        Ok(Some(admin_id))
    }

    pub fn unsubscribe(&self, admin_id: AdminId) -> Result<()> {
        self.write()?.remove(&admin_id);
        Ok(())
    }

    /// Push the current snapshot to every authorized subscriber, dropping
    /// channels that are gone.
    pub async fn broadcast(&self) {
        let subscribers: Vec<(AdminId, Arc<dyn EventSink>)> = match self.subscribers.read() {
            Ok(guard) => guard
                .iter()
                .map(|(id, sink)| (*id, sink.clone()))
                .collect(),
            Err(_) => return,
        };

        if subscribers.is_empty() {
            return;
        }

        let snapshot = self.metrics.snapshot();
        let mut dead = Vec::new();

        for (admin_id, sink) in subscribers {
            if !sink.is_connected() {
                dead.push(admin_id);
                continue;
            }
            if sink
                .deliver(ServerEvent::AdminMetrics(snapshot.clone()))
                .await
                .is_err()
            {
                dead.push(admin_id);
            }
        }

        if !dead.is_empty() {
            if let Ok(mut guard) = self.subscribers.write() {
                for admin_id in dead {
                    guard.remove(&admin_id);
                }
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Start the periodic push task.
    pub fn start_push_task(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.broadcast().await;
            }
        })
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<AdminId, Arc<dyn EventSink>>>> {
        self.subscribers.write().map_err(|_| {
            ChatError::Internal {
                message: "admin feed lock poisoned".to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as ChatResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct RecordingSink {
        connected: AtomicBool,
        closed: AtomicBool,
        events: Mutex<Vec<ServerEvent>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                connected: AtomicBool::new(true),
                closed: AtomicBool::new(false),
                events: Mutex::new(Vec::new()),
            })
        }

        fn events(&self) -> Vec<ServerEvent> {
            self.events.lock().map(|e| e.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn deliver(&self, event: ServerEvent) -> ChatResult<()> {
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

    fn feed() -> Arc<AdminFeed> {
        Arc::new(AdminFeed::new(
            Arc::new(MetricsAggregator::new()),
            "top-secret".to_string(),
        ))
    }

    #[tokio::test]
    async fn test_valid_token_gets_snapshot() {
        let feed = feed();
        let sink = RecordingSink::new();

        let admin_id = feed.subscribe(sink.clone(), "top-secret").await.unwrap();
        assert!(admin_id.is_some());
        assert_eq!(feed.subscriber_count(), 1);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "admin_metrics");
    }

    #[tokio::test]
    async fn test_bad_token_errors_and_closes() {
        let feed = feed();
        let sink = RecordingSink::new();

        let admin_id = feed.subscribe(sink.clone(), "wrong").await.unwrap();
        assert!(admin_id.is_none());
        assert_eq!(feed.subscriber_count(), 0);
        assert!(sink.closed.load(Ordering::SeqCst));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "system_error");
    }

    #[tokio::test]
    async fn test_broadcast_drops_disconnected() {
        let feed = feed();
        let live = RecordingSink::new();
        let gone = RecordingSink::new();

        feed.subscribe(live.clone(), "top-secret").await.unwrap();
        feed.subscribe(gone.clone(), "top-secret").await.unwrap();
        gone.connected.store(false, Ordering::SeqCst);

        feed.broadcast().await;
        assert_eq!(feed.subscriber_count(), 1);
        assert_eq!(live.events().len(), 2); // subscribe snapshot + broadcast
    }
}
