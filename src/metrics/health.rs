//! Health check endpoints and Prometheus metrics server
//!
//! A small Axum app the surrounding deployment probes: `/` and `/alive`
//! answer the plain liveness shape (`ok: true` plus a timestamp),
//! `/health` adds the current counters, `/metrics` serves the Prometheus
//! exposition.

use crate::metrics::aggregator::MetricsAggregator;
use crate::metrics::collector::MetricsCollector;
use crate::utils::current_timestamp;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    /// Port to bind the health server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for the health server
#[derive(Clone)]
pub struct HealthServerState {
    pub aggregator: Arc<MetricsAggregator>,
    pub collector: Arc<MetricsCollector>,
}

/// HTTP endpoints for liveness probes and scraping
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    pub fn new(
        config: HealthServerConfig,
        aggregator: Arc<MetricsAggregator>,
        collector: Arc<MetricsCollector>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HealthServerState {
                aggregator,
                collector,
            },
            shutdown_tx,
        }
    }

    /// Bind and serve until a shutdown signal arrives.
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid health server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr).await?;

        info!("Health server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Health server shutdown signal received");
            })
            .await?;

        info!("Health server stopped");
        Ok(())
    }

    fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/alive", get(root_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state.clone())
    }

    /// Signal the serve loop to stop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "timestamp": current_timestamp().to_rfc3339(),
    }))
}

async fn health_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    let snapshot = state.aggregator.snapshot();
    Json(json!({
        "status": "healthy",
        "online_users": snapshot.online_users,
        "active_rooms": snapshot.active_rooms,
        "peak_online_users": snapshot.peak_online_users,
        "avg_session_duration_sec": snapshot.avg_session_duration_sec,
        "timestamp": snapshot.at.to_rfc3339(),
    }))
}

async fn metrics_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    match state.collector.scrape(&state.aggregator) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                String::new(),
            )
                .into_response()
        }
    }
}
