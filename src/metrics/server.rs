//! HTTP exporter for the monitor metrics.

use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

/// Errors that can occur during metrics server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    /// The server stopped with an error.
    #[error("server error: {0}")]
    Server(String),
}

/// Configuration for the metrics server.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

impl MetricsServerConfig {
    /// Listens on all interfaces at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
        }
    }
}

/// Cloneable handle for pushing snapshots into a running exporter.
#[derive(Clone)]
pub struct MetricsHandle {
    registry: Arc<RwLock<MetricsRegistry>>,
}

impl MetricsHandle {
    /// Applies a monitor snapshot to the exported metrics.
    pub async fn update(&self, snapshot: &MetricsSnapshot) {
        self.registry.read().await.update(snapshot);
    }

    /// Current exposition text.
    pub async fn render(&self) -> Result<String, super::MetricsError> {
        self.registry.read().await.encode()
    }
}

/// Serves `/metrics` (Prometheus text) and `/health`.
pub struct MetricsServer {
    config: MetricsServerConfig,
    handle: MetricsHandle,
}

impl MetricsServer {
    /// Creates a server around `registry`.
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry) -> Self {
        Self {
            config,
            handle: MetricsHandle {
                registry: Arc::new(RwLock::new(registry)),
            },
        }
    }

    /// Handle for pushing updates while the server runs.
    pub fn handle(&self) -> MetricsHandle {
        self.handle.clone()
    }

    /// Routes served by the exporter.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.handle.clone())
    }

    /// Runs the server until it fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!(addr = %self.config.bind_addr, "metrics server listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))
    }
}

async fn metrics_handler(State(handle): State<MetricsHandle>) -> impl IntoResponse {
    match handle.render().await {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("failed to encode metrics: {e}"),
        ),
    }
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
