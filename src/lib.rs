//! Duet Room - anonymous pair-chat matchmaking service
//!
//! This crate pairs concurrently-connected users into ephemeral two-party
//! chat rooms, relays text/image messages between partners, and bounds
//! everything with per-action rate limits and idle/max-duration timers.
//! Nothing is persisted; identities are per-connection random ids.

pub mod admin;
pub mod config;
pub mod coord;
pub mod error;
pub mod limiter;
pub mod matchmaking;
pub mod metrics;
pub mod room;
pub mod service;
pub mod session;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{ChatError, ErrorCode, Result};
pub use types::*;

// Re-export key components
pub use coord::CoordinationStore;
pub use matchmaking::MatchmakingEngine;
pub use room::RoomLifecycle;
pub use service::{AppState, ChatHandlers};
pub use session::{EventSink, SessionRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
