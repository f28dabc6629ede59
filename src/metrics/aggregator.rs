//! Cumulative domain counters
//!
//! Everything here is a plain atomic: updates are simple
//! increments/compares, so a snapshot needs no locking.

use crate::types::MetricsSnapshot;
use crate::utils::current_timestamp;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Online/active/peak/duration counters behind atomics
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    online: AtomicUsize,
    peak_online: AtomicUsize,
    active_rooms: AtomicUsize,
    duration_sum_ms: AtomicU64,
    ended_sessions: AtomicU64,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_user_connected(&self) {
        let online = self.online.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_online.fetch_max(online, Ordering::SeqCst);
    }

    pub fn on_user_disconnected(&self) {
        let _ = self
            .online
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |value| {
                Some(value.saturating_sub(1))
            });
    }

    pub fn on_room_started(&self) {
        self.active_rooms.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a completed session once per successful termination.
    pub fn on_room_ended(&self, duration: Duration) {
        let _ = self
            .active_rooms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |value| {
                Some(value.saturating_sub(1))
            });
        self.duration_sum_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
        self.ended_sessions.fetch_add(1, Ordering::SeqCst);
    }

    pub fn ended_sessions(&self) -> u64 {
        self.ended_sessions.load(Ordering::SeqCst)
    }

    /// Point-in-time read of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let duration_sum_ms = self.duration_sum_ms.load(Ordering::SeqCst);
        let ended = self.ended_sessions.load(Ordering::SeqCst);

        let avg_session_duration_sec = if ended > 0 {
            duration_sum_ms as f64 / 1000.0 / ended as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            online_users: self.online.load(Ordering::SeqCst),
            active_rooms: self.active_rooms.load(Ordering::SeqCst),
            avg_session_duration_sec,
            peak_online_users: self.peak_online.load(Ordering::SeqCst),
            at: current_timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_never_decreases() {
        let metrics = MetricsAggregator::new();

        metrics.on_user_connected();
        metrics.on_user_connected();
        metrics.on_user_connected();
        assert_eq!(metrics.snapshot().peak_online_users, 3);

        metrics.on_user_disconnected();
        metrics.on_user_disconnected();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.online_users, 1);
        assert_eq!(snapshot.peak_online_users, 3);

        metrics.on_user_connected();
        metrics.on_user_connected();
        metrics.on_user_connected();
        assert_eq!(metrics.snapshot().peak_online_users, 4);
    }

    #[test]
    fn test_online_never_goes_negative() {
        let metrics = MetricsAggregator::new();
        metrics.on_user_disconnected();
        assert_eq!(metrics.snapshot().online_users, 0);
    }

    #[test]
    fn test_average_duration() {
        let metrics = MetricsAggregator::new();
        assert_eq!(metrics.snapshot().avg_session_duration_sec, 0.0);

        metrics.on_room_started();
        metrics.on_room_started();
        metrics.on_room_ended(Duration::from_secs(10));
        metrics.on_room_ended(Duration::from_secs(20));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_rooms, 0);
        assert!((snapshot.avg_session_duration_sec - 15.0).abs() < f64::EPSILON);
        assert_eq!(metrics.ended_sessions(), 2);
    }
}
