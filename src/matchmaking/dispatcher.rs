//! Match-attempt dispatch
//!
//! Decouples "a user became eligible to match" from "run the pairing
//! pass". [`DirectDispatcher`] collapses the two into an inline call for
//! the single-owner deployment; [`PooledDispatcher`] publishes attempts to
//! a channel drained by a bounded worker pool so pairing runs off the
//! connection-handling path.

use crate::error::{ChatError, Result};
use crate::matchmaking::engine::MatchmakingEngine;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Triggers a pairing pass after a successful enqueue
#[async_trait]
pub trait MatchDispatcher: Send + Sync {
    async fn dispatch(&self) -> Result<()>;
}

/// Runs the pairing pass inline
pub struct DirectDispatcher {
    engine: Arc<MatchmakingEngine>,
}

impl DirectDispatcher {
    pub fn new(engine: Arc<MatchmakingEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl MatchDispatcher for DirectDispatcher {
    async fn dispatch(&self) -> Result<()> {
        self.engine.run_match_pass().await?;
        Ok(())
    }
}

/// Publishes attempts to a bounded worker pool
pub struct PooledDispatcher {
    tx: mpsc::UnboundedSender<()>,
}

impl PooledDispatcher {
    /// Start the drain task. At most `concurrency` passes run at once;
    /// further attempts queue on the channel.
    pub fn start(engine: Arc<MatchmakingEngine>, concurrency: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let semaphore = Arc::new(Semaphore::new(concurrency));

        let handle = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                let engine = engine.clone();
                tokio::spawn(async move {
                    if let Err(e) = engine.run_match_pass().await {
                        error!("Match attempt failed: {}", e);
                    }
                    drop(permit);
                });
            }
            debug!("Match dispatcher drain task stopped");
        });

        (Self { tx }, handle)
    }
}

#[async_trait]
impl MatchDispatcher for PooledDispatcher {
    async fn dispatch(&self) -> Result<()> {
        self.tx.send(()).map_err(|_| {
            ChatError::Internal {
                message: "match dispatcher is gone".to_string(),
            }
            .into()
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
    use crate::room::RoomLifecycle;
    use crate::session::{EventSink, SessionRegistry};
    use crate::types::ServerEvent;
    use std::time::Duration;

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

    fn engine() -> (Arc<MatchmakingEngine>, Arc<SessionRegistry>, Arc<RoomLifecycle>) {
        let config = AppConfig::default();
        let sessions = Arc::new(SessionRegistry::new());
        let store: Arc<dyn CoordinationStore> = Arc::new(LockingCoordStore::new());
        let metrics = Arc::new(MetricsAggregator::new());
        let rooms = Arc::new(RoomLifecycle::new(
            sessions.clone(),
            store.clone(),
            metrics,
            &config,
        ));
        let engine = Arc::new(MatchmakingEngine::new(
            store,
            sessions.clone(),
            rooms.clone(),
            config.pairing_lock_ttl(),
        ));
        (engine, sessions, rooms)
    }

    #[tokio::test]
    async fn test_direct_dispatch_pairs_inline() {
        let (engine, sessions, rooms) = engine();
        let u1 = sessions.register(Arc::new(NullSink), "ip".into()).unwrap();
        let u2 = sessions.register(Arc::new(NullSink), "ip".into()).unwrap();
        engine.enqueue(u1).await.unwrap();
        engine.enqueue(u2).await.unwrap();

        let dispatcher = DirectDispatcher::new(engine);
        dispatcher.dispatch().await.unwrap();

        assert_eq!(rooms.active_count(), 1);
    }

    #[tokio::test]
    async fn test_pooled_dispatch_pairs_eventually() {
        let (engine, sessions, rooms) = engine();
        let u1 = sessions.register(Arc::new(NullSink), "ip".into()).unwrap();
        let u2 = sessions.register(Arc::new(NullSink), "ip".into()).unwrap();
        engine.enqueue(u1).await.unwrap();
        engine.enqueue(u2).await.unwrap();

        let (dispatcher, drain) = PooledDispatcher::start(engine, 4);
        dispatcher.dispatch().await.unwrap();

        // The pool runs off-path; poll briefly for the result.
        for _ in 0..50 {
            if rooms.active_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(rooms.active_count(), 1);

        drain.abort();
    }
}
