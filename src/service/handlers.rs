//! Engine-facing operation surface
//!
//! The transport adapter calls exactly these methods, one per inbound
//! operation. Validation runs in the original order: rate limit first,
//! then payload shape, then sanitization/length/mime/size, then room
//! membership. Client failures are delivered to the originating sink as
//! `SystemError` events and never escape as `Err`.

use crate::admin::{AdminFeed, AdminId};
use crate::config::AppConfig;
use crate::coord::{alias_key, CoordinationStore};
use crate::error::{ErrorCode, Result};
use crate::matchmaking::{EnqueueOutcome, MatchDispatcher, MatchmakingEngine};
use crate::metrics::MetricsAggregator;
use crate::room::{RelayService, RoomLifecycle};
use crate::session::{EventSink, SessionRegistry};
use crate::types::{ClientEvent, EndReason, ImageMime, ServerEvent, UserId};
use crate::utils::sanitize_text;
use crate::limiter::RateLimiter;
use std::sync::Arc;
use tracing::debug;

/// All inbound operations of the chat engine
pub struct ChatHandlers {
    config: AppConfig,
    sessions: Arc<SessionRegistry>,
    store: Arc<dyn CoordinationStore>,
    rooms: Arc<RoomLifecycle>,
    relay: Arc<RelayService>,
    engine: Arc<MatchmakingEngine>,
    dispatcher: Arc<dyn MatchDispatcher>,
    limiter: Arc<RateLimiter>,
    metrics: Arc<MetricsAggregator>,
    admin: Arc<AdminFeed>,
}

impl ChatHandlers {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AppConfig,
        sessions: Arc<SessionRegistry>,
        store: Arc<dyn CoordinationStore>,
        rooms: Arc<RoomLifecycle>,
        relay: Arc<RelayService>,
        engine: Arc<MatchmakingEngine>,
        dispatcher: Arc<dyn MatchDispatcher>,
        limiter: Arc<RateLimiter>,
        metrics: Arc<MetricsAggregator>,
        admin: Arc<AdminFeed>,
    ) -> Self {
        Self {
            config,
            sessions,
            store,
            rooms,
            relay,
            engine,
            dispatcher,
            limiter,
            metrics,
            admin,
        }
    }

    /// A connection was accepted: register it and hand back its opaque id.
    pub fn connect(&self, sink: Arc<dyn EventSink>, ip: String) -> Result<UserId> {
        let user_id = self.sessions.register(sink, ip)?;
        self.metrics.on_user_connected();
        Ok(user_id)
    }

    /// A connection dropped: sequence the downstream cleanup in order
    /// (queue removal, room termination, then the session record itself).
    pub async fn disconnect(&self, user_id: UserId) -> Result<()> {
        self.store.queue_remove(user_id).await?;
        self.rooms.end_by_user(user_id, EndReason::Disconnect).await?;

        if self.sessions.remove(user_id)?.is_some() {
            self.metrics.on_user_disconnected();
        }
        Ok(())
    }

    /// Join the waiting queue, optionally (re)stating an alias.
    pub async fn join_queue(&self, user_id: UserId, alias: Option<&str>) -> Result<()> {
        let Some(session) = self.sessions.get(user_id)? else {
            return Ok(());
        };

        if !self
            .limiter
            .allow(&session.ip, "queue_join", self.config.rate.queue_join)
        {
            return self
                .reject(user_id, ErrorCode::RateLimited, "Too many queue requests.")
                .await;
        }

        if let Some(raw) = alias {
            let normalized = self.sessions.set_alias(
                user_id,
                raw,
                self.config.chat.alias_min_length,
                self.config.chat.alias_max_length,
            )?;
            if let Some(normalized) = normalized {
                self.store
                    .put_with_expiry(alias_key(user_id), normalized, self.config.alias_ttl())
                    .await?;
            }
        }

        self.enqueue_and_match(user_id).await
    }

    /// Leave the current room and immediately look for a new partner. Only
    /// the abandoned partner hears about the ending.
    pub async fn skip(&self, user_id: UserId) -> Result<()> {
        let Some(session) = self.sessions.get(user_id)? else {
            return Ok(());
        };

        if !self.limiter.allow(&session.ip, "room_skip", self.config.rate.skip) {
            return self
                .reject(user_id, ErrorCode::RateLimited, "Skip rate limit exceeded.")
                .await;
        }

        self.rooms.end_by_user(user_id, EndReason::Skip).await?;
        self.enqueue_and_match(user_id).await
    }

    /// Re-enter the queue unless a room is already active.
    pub async fn stay(&self, user_id: UserId) -> Result<()> {
        if self.rooms.find_by_user(user_id)?.is_some() {
            return Ok(());
        }
        self.enqueue_and_match(user_id).await
    }

    /// Keep the current room alive.
    pub async fn heartbeat(&self, user_id: UserId) -> Result<()> {
        self.rooms.touch(user_id)
    }

    /// Relay text to the partner after validation.
    pub async fn send_text(&self, user_id: UserId, raw: &str) -> Result<()> {
        let Some(session) = self.sessions.get(user_id)? else {
            return Ok(());
        };

        if !self.limiter.allow(&session.ip, "chat_text", self.config.rate.text) {
            return self
                .reject(user_id, ErrorCode::RateLimited, "Message rate limit exceeded.")
                .await;
        }

        let text = sanitize_text(raw.trim());
        if text.is_empty() {
            return Ok(());
        }

        if text.chars().count() > self.config.chat.max_message_length {
            return self
                .reject(
                    user_id,
                    ErrorCode::MessageTooLong,
                    &format!("Max length is {}.", self.config.chat.max_message_length),
                )
                .await;
        }

        if !self.relay.text(user_id, text).await? {
            return self
                .reject(user_id, ErrorCode::NotInRoom, "You are not in an active room.")
                .await;
        }
        Ok(())
    }

    /// Relay an image to the partner after validation.
    pub async fn send_image(&self, user_id: UserId, mime: &str, bytes: Vec<u8>) -> Result<()> {
        let Some(session) = self.sessions.get(user_id)? else {
            return Ok(());
        };

        if !self.limiter.allow(&session.ip, "chat_image", self.config.rate.image) {
            return self
                .reject(user_id, ErrorCode::RateLimited, "Image rate limit exceeded.")
                .await;
        }

        let Some(mime) = ImageMime::parse(mime) else {
            return self
                .reject(
                    user_id,
                    ErrorCode::UnsupportedImage,
                    "Supported types: jpeg, png, webp.",
                )
                .await;
        };

        if bytes.len() > self.config.chat.max_image_bytes {
            return self
                .reject(
                    user_id,
                    ErrorCode::ImageTooLarge,
                    &format!("Max size is {} bytes.", self.config.chat.max_image_bytes),
                )
                .await;
        }

        if !self.relay.image(user_id, mime, bytes).await? {
            return self
                .reject(user_id, ErrorCode::NotInRoom, "You are not in an active room.")
                .await;
        }
        Ok(())
    }

    /// Authorize an admin channel against the configured secret.
    pub async fn admin_subscribe(
        &self,
        sink: Arc<dyn EventSink>,
        token: &str,
    ) -> Result<Option<AdminId>> {
        self.admin.subscribe(sink, token).await
    }

    /// Route a validated inbound event to its handler.
    ///
    /// `AdminSubscribe` arrives on the dedicated admin channel, not here.
    pub async fn handle_event(&self, user_id: UserId, event: ClientEvent) -> Result<()> {
        match event {
            ClientEvent::JoinQueue { alias } => self.join_queue(user_id, alias.as_deref()).await,
            ClientEvent::SkipRoom => self.skip(user_id).await,
            ClientEvent::Stay => self.stay(user_id).await,
            ClientEvent::Heartbeat => self.heartbeat(user_id).await,
            ClientEvent::SendText { text } => self.send_text(user_id, &text).await,
            ClientEvent::SendImage { mime, bytes } => {
                self.send_image(user_id, &mime, bytes).await
            }
            ClientEvent::AdminSubscribe { .. } => {
                self.reject(user_id, ErrorCode::BadRequest, "Unsupported event.")
                    .await
            }
        }
    }

    async fn enqueue_and_match(&self, user_id: UserId) -> Result<()> {
        match self.engine.enqueue(user_id).await? {
            EnqueueOutcome::InRoom => {
                self.reject(
                    user_id,
                    ErrorCode::BadRequest,
                    "Leave the active room before joining the queue.",
                )
                .await
            }
            EnqueueOutcome::Queued => {
                self.sessions
                    .deliver(user_id, ServerEvent::QueueWaiting)
                    .await;
                self.dispatcher.dispatch().await
            }
            // Already mid-flow; no duplicate waiting acknowledgment.
            EnqueueOutcome::AlreadyQueued => Ok(()),
        }
    }

    async fn reject(&self, user_id: UserId, code: ErrorCode, message: &str) -> Result<()> {
        debug!("Rejecting {} with {}: {}", user_id, code, message);
        self.sessions
            .deliver(
                user_id,
                ServerEvent::SystemError {
                    code,
                    message: message.to_string(),
                },
            )
            .await;
        Ok(())
    }
}
