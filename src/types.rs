//! Common types used throughout the pair-chat engine

use crate::error::ErrorCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connected user
pub type UserId = Uuid;

/// Unique identifier for a chat room
pub type RoomId = Uuid;

/// Reason a room terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Skip,
    Disconnect,
    Timeout,
    MaxDuration,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndReason::Skip => write!(f, "skip"),
            EndReason::Disconnect => write!(f, "disconnect"),
            EndReason::Timeout => write!(f, "timeout"),
            EndReason::MaxDuration => write!(f, "max_duration"),
        }
    }
}

/// Status of an active room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Active,
    Ending,
}

/// A user waiting to be paired
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub user_id: UserId,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            enqueued_at: crate::utils::current_timestamp(),
        }
    }
}

/// The ephemeral two-party relay session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRecord {
    pub room_id: RoomId,
    pub user_a: UserId,
    pub user_b: UserId,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub status: RoomStatus,
}

impl RoomRecord {
    /// The other member of the room, given one member.
    pub fn partner_of(&self, user_id: UserId) -> UserId {
        if self.user_a == user_id {
            self.user_b
        } else {
            self.user_a
        }
    }

    pub fn members(&self) -> [UserId; 2] {
        [self.user_a, self.user_b]
    }
}

/// Image mime types accepted for relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageMime {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/webp")]
    Webp,
}

impl ImageMime {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "image/jpeg" => Some(ImageMime::Jpeg),
            "image/png" => Some(ImageMime::Png),
            "image/webp" => Some(ImageMime::Webp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMime::Jpeg => "image/jpeg",
            ImageMime::Png => "image/png",
            ImageMime::Webp => "image/webp",
        }
    }
}

/// Point-in-time counters pushed to the admin feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub online_users: usize,
    pub active_rooms: usize,
    pub avg_session_duration_sec: f64,
    pub peak_online_users: usize,
    pub at: DateTime<Utc>,
}

/// Inbound events, one closed variant per logical operation.
///
/// The transport adapter validates the wire payload into this type once at
/// the boundary; nothing duck-typed reaches the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinQueue { alias: Option<String> },
    SkipRoom,
    Stay,
    Heartbeat,
    SendText { text: String },
    SendImage { mime: String, bytes: Vec<u8> },
    AdminSubscribe { token: String },
}

/// Outbound events delivered through a connection's [`EventSink`]
///
/// [`EventSink`]: crate::session::EventSink
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    QueueWaiting,
    RoomMatched {
        room_id: RoomId,
        partner_id: UserId,
        partner_alias: Option<String>,
    },
    RoomEnded {
        reason: EndReason,
    },
    TextRelayed {
        from: UserId,
        alias: Option<String>,
        text: String,
        at: DateTime<Utc>,
    },
    ImageRelayed {
        from: UserId,
        alias: Option<String>,
        mime: ImageMime,
        bytes: Vec<u8>,
        at: DateTime<Utc>,
    },
    SystemError {
        code: ErrorCode,
        message: String,
    },
    AdminMetrics(MetricsSnapshot),
}

impl ServerEvent {
    /// Short tag for logging and test assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::QueueWaiting => "queue_waiting",
            ServerEvent::RoomMatched { .. } => "room_matched",
            ServerEvent::RoomEnded { .. } => "room_ended",
            ServerEvent::TextRelayed { .. } => "text_relayed",
            ServerEvent::ImageRelayed { .. } => "image_relayed",
            ServerEvent::SystemError { .. } => "system_error",
            ServerEvent::AdminMetrics(_) => "admin_metrics",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partner_of_is_symmetric() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let now = crate::utils::current_timestamp();
        let room = RoomRecord {
            room_id: Uuid::new_v4(),
            user_a: a,
            user_b: b,
            started_at: now,
            last_activity_at: now,
            status: RoomStatus::Active,
        };

        assert_eq!(room.partner_of(a), b);
        assert_eq!(room.partner_of(b), a);
    }

    #[test]
    fn test_image_mime_allow_list() {
        assert_eq!(ImageMime::parse("image/jpeg"), Some(ImageMime::Jpeg));
        assert_eq!(ImageMime::parse("image/png"), Some(ImageMime::Png));
        assert_eq!(ImageMime::parse("image/webp"), Some(ImageMime::Webp));
        assert_eq!(ImageMime::parse("image/gif"), None);
        assert_eq!(ImageMime::parse("text/html"), None);
    }

    #[test]
    fn test_end_reason_wire_format() {
        let json = serde_json::to_string(&EndReason::MaxDuration).unwrap();
        assert_eq!(json, "\"max_duration\"");
        assert_eq!(EndReason::Skip.to_string(), "skip");
    }

    #[test]
    fn test_server_event_round_trips_tagged() {
        let event = ServerEvent::RoomEnded {
            reason: EndReason::Timeout,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"room_ended\""));

        let back: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), "room_ended");
    }
}
