//! The pairing engine
//!
//! One pairing pass drains the waiting queue two entries at a time and
//! turns eligible pairs into rooms. Passes are serialized globally by the
//! store's pairing lock, and the pop itself is two-or-nothing, so two
//! concurrent passes can never consume the same entry.

use crate::coord::{alias_key, CoordinationStore, PAIRING_LOCK};
use crate::error::Result;
use crate::room::RoomLifecycle;
use crate::session::SessionRegistry;
use crate::types::{QueueEntry, RoomRecord, ServerEvent, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// What happened to an enqueue request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Entered the queue; a match attempt should follow
    Queued,
    /// Already waiting; nothing to do
    AlreadyQueued,
    /// Still in a room; the request is invalid
    InRoom,
}

/// Drains the waiting queue into rooms
pub struct MatchmakingEngine {
    store: Arc<dyn CoordinationStore>,
    sessions: Arc<SessionRegistry>,
    rooms: Arc<RoomLifecycle>,
    pairing_lock_ttl: Duration,
}

impl MatchmakingEngine {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        sessions: Arc<SessionRegistry>,
        rooms: Arc<RoomLifecycle>,
        pairing_lock_ttl: Duration,
    ) -> Self {
        Self {
            store,
            sessions,
            rooms,
            pairing_lock_ttl,
        }
    }

    /// Put a user into the waiting queue.
    ///
    /// Users still holding a room must leave it first; users already
    /// waiting stay where they are (set semantics).
    pub async fn enqueue(&self, user_id: UserId) -> Result<EnqueueOutcome> {
        let Some(session) = self.sessions.get(user_id)? else {
            // Disconnected between the request and here; nothing to queue.
            return Ok(EnqueueOutcome::AlreadyQueued);
        };

        if session.room_id.is_some() {
            return Ok(EnqueueOutcome::InRoom);
        }

        if self.store.queue_push_back(QueueEntry::new(user_id)).await? {
            debug!("User {} entered the waiting queue", user_id);
            Ok(EnqueueOutcome::Queued)
        } else {
            Ok(EnqueueOutcome::AlreadyQueued)
        }
    }

    /// Run one pairing pass. Returns the number of rooms created.
    ///
    /// When another pass holds the pairing lock this returns immediately;
    /// the in-flight pass will drain whatever this one would have.
    pub async fn run_match_pass(&self) -> Result<usize> {
        if !self.store.try_lock(PAIRING_LOCK, self.pairing_lock_ttl).await? {
            debug!("Pairing pass already in flight");
            return Ok(0);
        }

        let outcome = self.drain_queue().await;
        self.store.unlock(PAIRING_LOCK).await?;
        outcome
    }

    async fn drain_queue(&self) -> Result<usize> {
        let mut created = 0;

        loop {
            let Some((first, second)) = self.store.queue_pop_pair().await? else {
                break;
            };

            // A disconnect/requeue race can hand the same user back twice;
            // requeue one copy and keep going.
            if first.user_id == second.user_id {
                self.store.queue_push_back(first).await?;
                continue;
            }

            let first_eligible = self.is_eligible(first.user_id)?;
            let second_eligible = self.is_eligible(second.user_id)?;

            match (first_eligible, second_eligible) {
                (false, false) => continue,
                (true, false) => {
                    // Stale partner; the survivor keeps its place in line.
                    self.store.queue_push_front(first).await?;
                    continue;
                }
                (false, true) => {
                    self.store.queue_push_front(second).await?;
                    continue;
                }
                (true, true) => {}
            }

            match self.rooms.create(first.user_id, second.user_id)? {
                Some(room) => {
                    created += 1;
                    self.notify_matched(&room).await;
                }
                // The duplicate-pairing guard tripped under a race; the
                // pair is dropped and the users re-enter on their next
                // request.
                None => continue,
            }
        }

        if created > 0 {
            info!("Pairing pass created {} rooms", created);
        }
        Ok(created)
    }

    /// Stale entries are users who vanished, dropped their connection, or
    /// got a room since enqueueing.
    fn is_eligible(&self, user_id: UserId) -> Result<bool> {
        Ok(match self.sessions.get(user_id)? {
            Some(session) => session.room_id.is_none() && session.sink.is_connected(),
            None => false,
        })
    }

    async fn notify_matched(&self, room: &RoomRecord) {
        let alias_a = self.resolve_alias(room.user_a).await;
        let alias_b = self.resolve_alias(room.user_b).await;

        self.sessions
            .deliver(
                room.user_a,
                ServerEvent::RoomMatched {
                    room_id: room.room_id,
                    partner_id: room.user_b,
                    partner_alias: alias_b,
                },
            )
            .await;

        self.sessions
            .deliver(
                room.user_b,
                ServerEvent::RoomMatched {
                    room_id: room.room_id,
                    partner_id: room.user_a,
                    partner_alias: alias_a,
                },
            )
            .await;
    }

    /// The session's alias wins; the store's retained copy covers users who
    /// re-entered the queue without restating one.
    async fn resolve_alias(&self, user_id: UserId) -> Option<String> {
        if let Ok(Some(alias)) = self.sessions.alias_of(user_id) {
            return Some(alias);
        }
        self.store.get(&alias_key(user_id)).await.ok().flatten()
    }
}
