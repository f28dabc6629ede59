//! Partner relay
//!
//! Resolves the sender's room and partner, touches the room, and delivers
//! the message event. Content validation (length, mime, size) happens in
//! the handlers before anything reaches this point.

use crate::error::Result;
use crate::room::lifecycle::RoomLifecycle;
use crate::session::SessionRegistry;
use crate::types::{ImageMime, ServerEvent, UserId};
use crate::utils::current_timestamp;
use std::sync::Arc;

/// Relays validated messages between paired partners
pub struct RelayService {
    rooms: Arc<RoomLifecycle>,
    sessions: Arc<SessionRegistry>,
}

impl RelayService {
    pub fn new(rooms: Arc<RoomLifecycle>, sessions: Arc<SessionRegistry>) -> Self {
        Self { rooms, sessions }
    }

    /// Relay text to the sender's partner. Returns `false` when the sender
    /// has no active room.
    pub async fn text(&self, from: UserId, text: String) -> Result<bool> {
        let Some(room) = self.rooms.find_by_user(from)? else {
            return Ok(false);
        };

        self.rooms.touch(from)?;

        let partner = room.partner_of(from);
        let alias = self.sessions.alias_of(from)?;
        self.sessions
            .deliver(
                partner,
                ServerEvent::TextRelayed {
                    from,
                    alias,
                    text,
                    at: current_timestamp(),
                },
            )
            .await;
        Ok(true)
    }

    /// Relay an image to the sender's partner. Returns `false` when the
    /// sender has no active room.
    pub async fn image(&self, from: UserId, mime: ImageMime, bytes: Vec<u8>) -> Result<bool> {
        let Some(room) = self.rooms.find_by_user(from)? else {
            return Ok(false);
        };

        self.rooms.touch(from)?;

        let partner = room.partner_of(from);
        let alias = self.sessions.alias_of(from)?;
        self.sessions
            .deliver(
                partner,
                ServerEvent::ImageRelayed {
                    from,
                    alias,
                    mime,
                    bytes,
                    at: current_timestamp(),
                },
            )
            .await;
        Ok(true)
    }
}
