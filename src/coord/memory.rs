//! Mutex-guarded coordination store
//!
//! The in-process locking backend: one mutex over [`StoreState`], so every
//! trait operation is trivially atomic. Lock scopes never cross an await.

use crate::coord::{CoordinationStore, StoreState};
use crate::error::{ChatError, Result};
use crate::types::{QueueEntry, UserId};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Coordination store backed by a single in-process mutex
#[derive(Debug, Default)]
pub struct LockingCoordStore {
    state: Mutex<StoreState>,
}

impl LockingCoordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|_| {
            ChatError::Internal {
                message: "coordination store lock poisoned".to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl CoordinationStore for LockingCoordStore {
    async fn queue_push_back(&self, entry: QueueEntry) -> Result<bool> {
        Ok(self.state()?.push_back(entry))
    }

    async fn queue_push_front(&self, entry: QueueEntry) -> Result<()> {
        self.state()?.push_front(entry);
        Ok(())
    }

    async fn queue_remove(&self, user_id: UserId) -> Result<()> {
        self.state()?.remove(user_id);
        Ok(())
    }

    async fn queue_pop_pair(&self) -> Result<Option<(QueueEntry, QueueEntry)>> {
        Ok(self.state()?.pop_pair())
    }

    async fn queue_len(&self) -> Result<usize> {
        Ok(self.state()?.queue_len())
    }

    async fn put_with_expiry(&self, key: String, value: String, ttl: Duration) -> Result<()> {
        self.state()?.put(key, value, ttl, Instant::now());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state()?.get(key, Instant::now()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.state()?.delete(key);
        Ok(())
    }

    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<bool> {
        Ok(self.state()?.try_lock(key, ttl, Instant::now()))
    }

    async fn unlock(&self, key: &str) -> Result<()> {
        self.state()?.unlock(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_enqueue_is_idempotent() {
        let store = LockingCoordStore::new();
        let user = Uuid::new_v4();

        assert!(store.queue_push_back(QueueEntry::new(user)).await.unwrap());
        assert!(!store.queue_push_back(QueueEntry::new(user)).await.unwrap());
        assert_eq!(store.queue_len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_pop_pair_two_or_nothing() {
        let store = LockingCoordStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store.queue_push_back(QueueEntry::new(a)).await.unwrap();
        assert!(store.queue_pop_pair().await.unwrap().is_none());

        store.queue_push_back(QueueEntry::new(b)).await.unwrap();
        let (first, second) = store.queue_pop_pair().await.unwrap().unwrap();
        assert_eq!(first.user_id, a);
        assert_eq!(second.user_id, b);
        assert_eq!(store.queue_len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_released() {
        let store = LockingCoordStore::new();
        let ttl = Duration::from_secs(5);

        assert!(store.try_lock("room:a", ttl).await.unwrap());
        assert!(!store.try_lock("room:a", ttl).await.unwrap());
        assert!(store.try_lock("room:b", ttl).await.unwrap());

        store.unlock("room:a").await.unwrap();
        assert!(store.try_lock("room:a", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_lock_ttl_expires() {
        let store = LockingCoordStore::new();

        assert!(store.try_lock("room:a", Duration::from_millis(20)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.try_lock("room:a", Duration::from_secs(5)).await.unwrap());
    }

    #[tokio::test]
    async fn test_kv_round_trip_with_ttl() {
        let store = LockingCoordStore::new();
        store
            .put_with_expiry("alias:u".to_string(), "ghost".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("alias:u").await.unwrap(), Some("ghost".to_string()));

        store.delete("alias:u").await.unwrap();
        assert_eq!(store.get("alias:u").await.unwrap(), None);
    }
}
