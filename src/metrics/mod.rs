//! Metrics: domain counters, Prometheus export, health endpoints

pub mod aggregator;
pub mod collector;
pub mod health;

pub use aggregator::MetricsAggregator;
pub use collector::MetricsCollector;
pub use health::{HealthServer, HealthServerConfig};
