//! Outbound event boundary
//!
//! The transport adapter (WebSocket framing, serialization, the actual
//! socket) lives outside this crate; it hands the engine one [`EventSink`]
//! per accepted connection and receives every outbound event through it.

use crate::error::Result;
use crate::types::ServerEvent;
use async_trait::async_trait;

/// One connection's outbound channel
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver an event to the connection. Delivery failures are the
    /// transport's problem; callers treat them as "peer unreachable".
    async fn deliver(&self, event: ServerEvent) -> Result<()>;

    /// Whether the underlying connection is still open.
    fn is_connected(&self) -> bool;

    /// Force-close the connection (admin-token mismatch).
    async fn close(&self);
}
