//! Prometheus export
//!
//! Mirrors the domain counters into a Prometheus registry for scraping.
//! The gauges are refreshed from a [`MetricsSnapshot`] right before every
//! encode, so nothing here is on a hot path.

use crate::metrics::aggregator::MetricsAggregator;
use crate::types::MetricsSnapshot;
use anyhow::Result;
use prometheus::{Encoder, Gauge, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Prometheus registry and the service's gauges
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,
    online_users: IntGauge,
    active_rooms: IntGauge,
    peak_online_users: IntGauge,
    avg_session_duration_seconds: Gauge,
    ended_sessions_total: IntGauge,
}

impl MetricsCollector {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let online_users = IntGauge::new("duet_online_users", "Currently connected users")?;
        let active_rooms = IntGauge::new("duet_active_rooms", "Currently active rooms")?;
        let peak_online_users = IntGauge::new(
            "duet_peak_online_users",
            "Highest observed concurrent user count",
        )?;
        let avg_session_duration_seconds = Gauge::new(
            "duet_avg_session_duration_seconds",
            "Average duration of ended sessions",
        )?;
        let ended_sessions_total =
            IntGauge::new("duet_ended_sessions_total", "Cumulative ended sessions")?;

        registry.register(Box::new(online_users.clone()))?;
        registry.register(Box::new(active_rooms.clone()))?;
        registry.register(Box::new(peak_online_users.clone()))?;
        registry.register(Box::new(avg_session_duration_seconds.clone()))?;
        registry.register(Box::new(ended_sessions_total.clone()))?;

        Ok(Self {
            registry,
            online_users,
            active_rooms,
            peak_online_users,
            avg_session_duration_seconds,
            ended_sessions_total,
        })
    }

    /// Refresh every gauge from a snapshot.
    pub fn observe(&self, snapshot: &MetricsSnapshot, ended_sessions: u64) {
        self.online_users.set(snapshot.online_users as i64);
        self.active_rooms.set(snapshot.active_rooms as i64);
        self.peak_online_users.set(snapshot.peak_online_users as i64);
        self.avg_session_duration_seconds
            .set(snapshot.avg_session_duration_sec);
        self.ended_sessions_total.set(ended_sessions as i64);
    }

    /// Refresh from the aggregator and encode the exposition format.
    pub fn scrape(&self, aggregator: &MetricsAggregator) -> Result<String> {
        self.observe(&aggregator.snapshot(), aggregator.ended_sessions());

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
