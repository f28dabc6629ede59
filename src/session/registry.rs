//! Session registry
//!
//! The single owner of [`Session`] records. Room pointers are only mutated
//! through [`SessionRegistry::claim_pair`] and
//! [`SessionRegistry::clear_room`] so that room membership stays consistent
//! with the room registry.

use crate::error::{ChatError, Result};
use crate::session::sink::EventSink;
use crate::types::{RoomId, ServerEvent, UserId};
use crate::utils::{generate_user_id, normalize_alias};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// A connected user's transient attributes
#[derive(Clone)]
pub struct Session {
    pub user_id: UserId,
    pub sink: Arc<dyn EventSink>,
    pub ip: String,
    pub alias: Option<String>,
    pub avatar: Option<String>,
    pub room_id: Option<RoomId>,
}

/// Registry of connected users
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<UserId, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<UserId, Session>>> {
        self.sessions.read().map_err(|_| {
            ChatError::Internal {
                message: "session registry lock poisoned".to_string(),
            }
            .into()
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<UserId, Session>>> {
        self.sessions.write().map_err(|_| {
            ChatError::Internal {
                message: "session registry lock poisoned".to_string(),
            }
            .into()
        })
    }

    /// Record a freshly accepted connection and assign its opaque id.
    pub fn register(&self, sink: Arc<dyn EventSink>, ip: String) -> Result<UserId> {
        let user_id = generate_user_id();
        let session = Session {
            user_id,
            sink,
            ip,
            alias: None,
            avatar: None,
            room_id: None,
        };

        self.write()?.insert(user_id, session);
        debug!("Registered session {}", user_id);
        Ok(user_id)
    }

    pub fn get(&self, user_id: UserId) -> Result<Option<Session>> {
        Ok(self.read()?.get(&user_id).cloned())
    }

    /// Normalize and store an alias. Returns the normalized alias, or `None`
    /// when the input does not survive normalization (caller keeps whatever
    /// alias was set before).
    pub fn set_alias(
        &self,
        user_id: UserId,
        raw: &str,
        min_len: usize,
        max_len: usize,
    ) -> Result<Option<String>> {
        let Some(alias) = normalize_alias(raw, min_len, max_len) else {
            return Ok(None);
        };

        let mut sessions = self.write()?;
        match sessions.get_mut(&user_id) {
            Some(session) => {
                session.alias = Some(alias.clone());
                Ok(Some(alias))
            }
            None => Ok(None),
        }
    }

    pub fn set_avatar(&self, user_id: UserId, avatar: Option<String>) -> Result<()> {
        if let Some(session) = self.write()?.get_mut(&user_id) {
            session.avatar = avatar;
        }
        Ok(())
    }

    pub fn alias_of(&self, user_id: UserId) -> Result<Option<String>> {
        Ok(self.read()?.get(&user_id).and_then(|s| s.alias.clone()))
    }

    /// Atomically point both members at `room_id`.
    ///
    /// Fails without touching either session when one of them is missing or
    /// already belongs to a room; this is the session half of the
    /// duplicate-pairing guard.
    pub fn claim_pair(&self, user_a: UserId, user_b: UserId, room_id: RoomId) -> Result<bool> {
        if user_a == user_b {
            return Ok(false);
        }

        let mut sessions = self.write()?;

        let claimable = matches!(sessions.get(&user_a), Some(s) if s.room_id.is_none())
            && matches!(sessions.get(&user_b), Some(s) if s.room_id.is_none());
        if !claimable {
            return Ok(false);
        }

        if let Some(session) = sessions.get_mut(&user_a) {
            session.room_id = Some(room_id);
        }
        if let Some(session) = sessions.get_mut(&user_b) {
            session.room_id = Some(room_id);
        }
        Ok(true)
    }

    /// Drop a user's room pointer if it references `room_id`.
    pub fn clear_room(&self, user_id: UserId, room_id: RoomId) -> Result<()> {
        if let Some(session) = self.write()?.get_mut(&user_id) {
            if session.room_id == Some(room_id) {
                session.room_id = None;
            }
        }
        Ok(())
    }

    pub fn room_of(&self, user_id: UserId) -> Result<Option<RoomId>> {
        Ok(self.read()?.get(&user_id).and_then(|s| s.room_id))
    }

    /// Remove a session. Downstream cleanup (queue removal, room
    /// termination) is sequenced by the caller; this only releases the
    /// record.
    pub fn remove(&self, user_id: UserId) -> Result<Option<Session>> {
        let removed = self.write()?.remove(&user_id);
        if removed.is_some() {
            debug!("Removed session {}", user_id);
        }
        Ok(removed)
    }

    pub fn online_count(&self) -> usize {
        self.read().map(|sessions| sessions.len()).unwrap_or(0)
    }

    /// Whether a user is present and its connection still open.
    pub fn is_connected(&self, user_id: UserId) -> Result<bool> {
        Ok(self
            .read()?
            .get(&user_id)
            .map(|session| session.sink.is_connected())
            .unwrap_or(false))
    }

    /// Deliver an event to one user, if still present.
    ///
    /// Delivery failures are logged and swallowed: a dead connection is
    /// cleaned up by its own disconnect path.
    pub async fn deliver(&self, user_id: UserId, event: ServerEvent) {
        let sink = match self.read() {
            Ok(sessions) => sessions.get(&user_id).map(|session| session.sink.clone()),
            Err(_) => None,
        };

        if let Some(sink) = sink {
            if let Err(error) = sink.deliver(event).await {
                debug!("Delivery to {} failed: {}", user_id, error);
            }
        }
    }
}
