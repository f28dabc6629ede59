//! Actor-owned coordination store
//!
//! The state is owned by one task and mutated only by commands arriving on
//! its channel, so each command is a single atomic step against the store,
//! the same guarantee the engine would get from a remote store's scripted
//! transaction. Callers await their reply on a oneshot.

use crate::coord::{CoordinationStore, StoreState};
use crate::error::{ChatError, Result};
use crate::types::{QueueEntry, UserId};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

enum Command {
    PushBack {
        entry: QueueEntry,
        reply: oneshot::Sender<bool>,
    },
    PushFront {
        entry: QueueEntry,
        reply: oneshot::Sender<()>,
    },
    Remove {
        user_id: UserId,
        reply: oneshot::Sender<()>,
    },
    PopPair {
        reply: oneshot::Sender<Option<(QueueEntry, QueueEntry)>>,
    },
    QueueLen {
        reply: oneshot::Sender<usize>,
    },
    Put {
        key: String,
        value: String,
        ttl: Duration,
        reply: oneshot::Sender<()>,
    },
    Get {
        key: String,
        reply: oneshot::Sender<Option<String>>,
    },
    Delete {
        key: String,
        reply: oneshot::Sender<()>,
    },
    TryLock {
        key: String,
        ttl: Duration,
        reply: oneshot::Sender<bool>,
    },
    Unlock {
        key: String,
        reply: oneshot::Sender<()>,
    },
}

/// Coordination store owned by a dedicated task
pub struct ActorCoordStore {
    tx: mpsc::UnboundedSender<Command>,
}

impl ActorCoordStore {
    /// Spawn the owning task and return a handle to it.
    ///
    /// The task exits when the last handle is dropped.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut state = StoreState::default();
            while let Some(command) = rx.recv().await {
                apply(&mut state, command);
            }
            debug!("Coordination actor stopped");
        });

        Self { tx }
    }

    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(build(reply_tx)).map_err(|_| ChatError::Internal {
            message: "coordination actor is gone".to_string(),
        })?;

        reply_rx.await.map_err(|_| {
            ChatError::Internal {
                message: "coordination actor dropped a reply".to_string(),
            }
            .into()
        })
    }
}

fn apply(state: &mut StoreState, command: Command) {
    match command {
        Command::PushBack { entry, reply } => {
            let _ = reply.send(state.push_back(entry));
        }
        Command::PushFront { entry, reply } => {
            state.push_front(entry);
            let _ = reply.send(());
        }
        Command::Remove { user_id, reply } => {
            state.remove(user_id);
            let _ = reply.send(());
        }
        Command::PopPair { reply } => {
            let _ = reply.send(state.pop_pair());
        }
        Command::QueueLen { reply } => {
            let _ = reply.send(state.queue_len());
        }
        Command::Put {
            key,
            value,
            ttl,
            reply,
        } => {
            state.put(key, value, ttl, Instant::now());
            let _ = reply.send(());
        }
        Command::Get { key, reply } => {
            let _ = reply.send(state.get(&key, Instant::now()));
        }
        Command::Delete { key, reply } => {
            state.delete(&key);
            let _ = reply.send(());
        }
        Command::TryLock { key, ttl, reply } => {
            let _ = reply.send(state.try_lock(&key, ttl, Instant::now()));
        }
        Command::Unlock { key, reply } => {
            state.unlock(&key);
            let _ = reply.send(());
        }
    }
}

#[async_trait]
impl CoordinationStore for ActorCoordStore {
    async fn queue_push_back(&self, entry: QueueEntry) -> Result<bool> {
        self.call(|reply| Command::PushBack { entry, reply }).await
    }

    async fn queue_push_front(&self, entry: QueueEntry) -> Result<()> {
        self.call(|reply| Command::PushFront { entry, reply }).await
    }

    async fn queue_remove(&self, user_id: UserId) -> Result<()> {
        self.call(|reply| Command::Remove { user_id, reply }).await
    }

    async fn queue_pop_pair(&self) -> Result<Option<(QueueEntry, QueueEntry)>> {
        self.call(|reply| Command::PopPair { reply }).await
    }

    async fn queue_len(&self) -> Result<usize> {
        self.call(|reply| Command::QueueLen { reply }).await
    }

    async fn put_with_expiry(&self, key: String, value: String, ttl: Duration) -> Result<()> {
        self.call(|reply| Command::Put {
            key,
            value,
            ttl,
            reply,
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.call(|reply| Command::Get { key, reply }).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.call(|reply| Command::Delete { key, reply }).await
    }

    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<bool> {
        let key = key.to_string();
        self.call(|reply| Command::TryLock { key, ttl, reply }).await
    }

    async fn unlock(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.call(|reply| Command::Unlock { key, reply }).await
    }
}
