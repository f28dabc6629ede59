//! Coordination store: waiting queue, TTL locks, expiring KV
//!
//! Everything the matchmaking engine and room lifecycle need for
//! cross-caller coordination sits behind [`CoordinationStore`]:
//!
//! - an ordered waiting queue with set-semantics membership and an atomic
//!   pop-two-or-nothing primitive,
//! - mutual-exclusion locks with a TTL that bounds contention if a holder
//!   crashes mid-operation,
//! - a small expiring key/value space (alias retention).
//!
//! Two adapters implement the contract: [`LockingCoordStore`] guards one
//! state value with a mutex, [`ActorCoordStore`] gives the state to a single
//! task and serializes commands over a channel so every multi-key operation
//! executes as one message. A networked store adapter would slot in behind
//! the same trait.

pub mod actor;
pub mod memory;

use crate::error::Result;
use crate::types::{QueueEntry, UserId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

pub use actor::ActorCoordStore;
pub use memory::LockingCoordStore;

/// Lock key serializing the pairing pass
pub const PAIRING_LOCK: &str = "pairing";

/// Lock key scoped to one room's termination
pub fn room_lock_key(room_id: crate::types::RoomId) -> String {
    format!("room:{}", room_id)
}

/// KV key holding a user's alias
pub fn alias_key(user_id: UserId) -> String {
    format!("alias:{}", user_id)
}

/// Shared coordination primitives
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Append a queue entry. Returns `false` (and leaves the queue
    /// untouched) when the user is already a member.
    async fn queue_push_back(&self, entry: QueueEntry) -> Result<bool>;

    /// Put an entry back at the head of the queue, preserving its priority.
    async fn queue_push_front(&self, entry: QueueEntry) -> Result<()>;

    /// Drop a user from the membership set and every queue position.
    async fn queue_remove(&self, user_id: UserId) -> Result<()>;

    /// Atomically pop the two head entries, or nothing if fewer than two
    /// entries are queued. Membership for both popped users is released.
    async fn queue_pop_pair(&self) -> Result<Option<(QueueEntry, QueueEntry)>>;

    /// Current queue length.
    async fn queue_len(&self) -> Result<usize>;

    /// Store a value that disappears after `ttl`.
    async fn put_with_expiry(&self, key: String, value: String, ttl: Duration) -> Result<()>;

    /// Read a value, if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Drop a value.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Acquire an exclusive lock on `key` for at most `ttl`. Returns `false`
    /// when another caller holds an unexpired lock.
    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Release a lock. Releasing an expired or absent lock is a no-op.
    async fn unlock(&self, key: &str) -> Result<()>;
}

#[derive(Debug)]
struct ExpiringValue {
    value: String,
    expires_at: Instant,
}

/// The one copy of coordination state both adapters operate on.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    queue: VecDeque<QueueEntry>,
    members: HashSet<UserId>,
    kv: HashMap<String, ExpiringValue>,
    locks: HashMap<String, Instant>,
}

impl StoreState {
    pub(crate) fn push_back(&mut self, entry: QueueEntry) -> bool {
        if !self.members.insert(entry.user_id) {
            return false;
        }
        self.queue.push_back(entry);
        true
    }

    pub(crate) fn push_front(&mut self, entry: QueueEntry) {
        // No membership guard: this path only re-inserts entries whose
        // membership was just released by a pop, and the rare duplicate a
        // disconnect/requeue race produces is resolved by the pairing pass.
        self.members.insert(entry.user_id);
        self.queue.push_front(entry);
    }

    pub(crate) fn remove(&mut self, user_id: UserId) {
        self.members.remove(&user_id);
        self.queue.retain(|entry| entry.user_id != user_id);
    }

    pub(crate) fn pop_pair(&mut self) -> Option<(QueueEntry, QueueEntry)> {
        if self.queue.len() < 2 {
            return None;
        }

        let first = self.queue.pop_front()?;
        let second = match self.queue.pop_front() {
            Some(entry) => entry,
            None => {
                self.queue.push_front(first);
                return None;
            }
        };

        self.members.remove(&first.user_id);
        self.members.remove(&second.user_id);
        Some((first, second))
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn put(&mut self, key: String, value: String, ttl: Duration, now: Instant) {
        self.purge_expired(now);
        self.kv.insert(
            key,
            ExpiringValue {
                value,
                expires_at: now + ttl,
            },
        );
    }

    pub(crate) fn get(&mut self, key: &str, now: Instant) -> Option<String> {
        self.purge_expired(now);
        self.kv.get(key).map(|entry| entry.value.clone())
    }

    pub(crate) fn delete(&mut self, key: &str) {
        self.kv.remove(key);
    }

    pub(crate) fn try_lock(&mut self, key: &str, ttl: Duration, now: Instant) -> bool {
        self.purge_expired(now);
        if self.locks.contains_key(key) {
            return false;
        }
        self.locks.insert(key.to_string(), now + ttl);
        true
    }

    pub(crate) fn unlock(&mut self, key: &str) {
        self.locks.remove(key);
    }

    fn purge_expired(&mut self, now: Instant) {
        self.kv.retain(|_, entry| entry.expires_at > now);
        self.locks.retain(|_, expires_at| *expires_at > now);
    }
}
