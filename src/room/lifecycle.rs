//! Room lifecycle management
//!
//! Owns the room registry and every mutation of it: creation behind the
//! duplicate-pairing guard, activity touches, idempotent termination under
//! a per-room TTL lock, and the expiry sweep.

use crate::config::AppConfig;
use crate::coord::{room_lock_key, CoordinationStore};
use crate::error::{ChatError, Result};
use crate::metrics::MetricsAggregator;
use crate::session::SessionRegistry;
use crate::types::{EndReason, RoomId, RoomRecord, RoomStatus, ServerEvent, UserId};
use crate::utils::{current_timestamp, generate_room_id};
use chrono::Duration as ChronoDuration;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Creates, queries, touches, and terminates rooms
pub struct RoomLifecycle {
    rooms: RwLock<HashMap<RoomId, RoomRecord>>,
    sessions: Arc<SessionRegistry>,
    store: Arc<dyn CoordinationStore>,
    metrics: Arc<MetricsAggregator>,
    idle_timeout: ChronoDuration,
    max_session_duration: ChronoDuration,
    room_lock_ttl: Duration,
}

impl RoomLifecycle {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        store: Arc<dyn CoordinationStore>,
        metrics: Arc<MetricsAggregator>,
        config: &AppConfig,
    ) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            sessions,
            store,
            metrics,
            idle_timeout: ChronoDuration::seconds(config.chat.idle_timeout_seconds as i64),
            max_session_duration: ChronoDuration::seconds(config.chat.max_session_seconds as i64),
            room_lock_ttl: config.room_lock_ttl(),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<RoomId, RoomRecord>>> {
        self.rooms.read().map_err(|_| {
            ChatError::Internal {
                message: "room registry lock poisoned".to_string(),
            }
            .into()
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<RoomId, RoomRecord>>> {
        self.rooms.write().map_err(|_| {
            ChatError::Internal {
                message: "room registry lock poisoned".to_string(),
            }
            .into()
        })
    }

    /// Create a room for two distinct users.
    ///
    /// Returns `None` when either user is already in a room: the
    /// authoritative duplicate-pairing guard. The room map's write lock is
    /// held across the session claim so the guard and the pointer
    /// assignment are one atomic step.
    pub fn create(&self, user_a: UserId, user_b: UserId) -> Result<Option<RoomRecord>> {
        if user_a == user_b {
            return Ok(None);
        }

        let room_id = generate_room_id();
        let now = current_timestamp();
        let record = RoomRecord {
            room_id,
            user_a,
            user_b,
            started_at: now,
            last_activity_at: now,
            status: RoomStatus::Active,
        };

        {
            let mut rooms = self.write()?;
            if !self.sessions.claim_pair(user_a, user_b, room_id)? {
                return Ok(None);
            }
            rooms.insert(room_id, record.clone());
        }

        self.metrics.on_room_started();
        info!("Created room {} for {} and {}", room_id, user_a, user_b);
        Ok(Some(record))
    }

    pub fn get(&self, room_id: RoomId) -> Result<Option<RoomRecord>> {
        Ok(self.read()?.get(&room_id).cloned())
    }

    /// Resolve the active room a user belongs to.
    ///
    /// A session pointing at a room that no longer exists is an internal
    /// inconsistency; the stale pointer is dropped and the room treated as
    /// absent.
    pub fn find_by_user(&self, user_id: UserId) -> Result<Option<RoomRecord>> {
        let Some(room_id) = self.sessions.room_of(user_id)? else {
            return Ok(None);
        };

        let room = self.read()?.get(&room_id).cloned();
        if room.is_none() {
            warn!("Dropping stale room pointer {} -> {}", user_id, room_id);
            self.sessions.clear_room(user_id, room_id)?;
        }
        Ok(room)
    }

    /// Advance a room's last-activity timestamp to now.
    pub fn touch(&self, user_id: UserId) -> Result<()> {
        let Some(room_id) = self.sessions.room_of(user_id)? else {
            return Ok(());
        };

        let now = current_timestamp();
        if let Some(room) = self.write()?.get_mut(&room_id) {
            if now > room.last_activity_at {
                room.last_activity_at = now;
            }
        }
        Ok(())
    }

    /// End the room a user belongs to, if any.
    pub async fn end_by_user(
        &self,
        user_id: UserId,
        reason: EndReason,
    ) -> Result<Option<RoomRecord>> {
        let Some(room) = self.find_by_user(user_id)? else {
            return Ok(None);
        };
        self.end_by_id(room.room_id, reason, Some(user_id)).await
    }

    /// End a room by id. Idempotent and race-safe: concurrent callers
    /// serialize on a short-TTL lock scoped to the room, and both lock
    /// contention and an already-gone room come back as a no-op `None`.
    pub async fn end_by_id(
        &self,
        room_id: RoomId,
        reason: EndReason,
        actor: Option<UserId>,
    ) -> Result<Option<RoomRecord>> {
        let lock_key = room_lock_key(room_id);
        if !self.store.try_lock(&lock_key, self.room_lock_ttl).await? {
            debug!("Termination of {} already in flight", room_id);
            return Ok(None);
        }

        let result = self.terminate(room_id, reason);
        self.store.unlock(&lock_key).await?;

        // Notification happens outside the lock; the room is already gone.
        if let Ok(Some(room)) = &result {
            self.notify_ended(room, reason, actor).await;
        }
        result
    }

    fn terminate(&self, room_id: RoomId, reason: EndReason) -> Result<Option<RoomRecord>> {
        // Re-read under the lock; a racing terminator may have won.
        let Some(mut room) = self.write()?.remove(&room_id) else {
            return Ok(None);
        };
        room.status = RoomStatus::Ending;

        self.sessions.clear_room(room.user_a, room_id)?;
        self.sessions.clear_room(room.user_b, room_id)?;

        let duration = (current_timestamp() - room.started_at)
            .to_std()
            .unwrap_or_default();
        self.metrics.on_room_ended(duration);

        info!(
            "Ended room {} (reason: {}, duration: {:.1}s)",
            room_id,
            reason,
            duration.as_secs_f64()
        );
        Ok(Some(room))
    }

    /// Skip tells only the other member; the actor is expected to re-enter
    /// the queue instead. Every other reason tells each still-connected
    /// member.
    async fn notify_ended(&self, room: &RoomRecord, reason: EndReason, actor: Option<UserId>) {
        if reason == EndReason::Skip {
            if let Some(actor) = actor {
                let partner = room.partner_of(actor);
                self.sessions
                    .deliver(partner, ServerEvent::RoomEnded { reason })
                    .await;
                return;
            }
        }

        for member in room.members() {
            if self.sessions.is_connected(member).unwrap_or(false) {
                self.sessions
                    .deliver(member, ServerEvent::RoomEnded { reason })
                    .await;
            }
        }
    }

    /// Terminate idle and over-duration rooms. Returns how many ended.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let now = current_timestamp();
        let expired: Vec<(RoomId, EndReason)> = {
            let rooms = self.read()?;
            rooms
                .values()
                .filter_map(|room| {
                    if now - room.last_activity_at > self.idle_timeout {
                        Some((room.room_id, EndReason::Timeout))
                    } else if now - room.started_at > self.max_session_duration {
                        Some((room.room_id, EndReason::MaxDuration))
                    } else {
                        None
                    }
                })
                .collect()
        };

        let mut ended = 0;
        for (room_id, reason) in expired {
            // Rooms may vanish between enumeration and termination.
            if self.end_by_id(room_id, reason, None).await?.is_some() {
                ended += 1;
            }
        }

        if ended > 0 {
            info!("Sweep ended {} expired rooms", ended);
        }
        Ok(ended)
    }

    pub fn active_count(&self) -> usize {
        self.read().map(|rooms| rooms.len()).unwrap_or(0)
    }

    /// Shift a room's timestamps into the past (sweep tests).
    #[cfg(test)]
    pub(crate) fn backdate(
        &self,
        room_id: RoomId,
        started_secs_ago: i64,
        activity_secs_ago: i64,
    ) {
        if let Ok(mut rooms) = self.rooms.write() {
            if let Some(room) = rooms.get_mut(&room_id) {
                let now = current_timestamp();
                room.started_at = now - ChronoDuration::seconds(started_secs_ago);
                room.last_activity_at = now - ChronoDuration::seconds(activity_secs_ago);
            }
        }
    }
}
