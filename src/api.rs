//! HTTP surface: notification ingest plus health and metrics endpoints.
//!
//! - POST /notifications — inbound transfer notification batch
//! - GET /health         — simple health check
//! - GET /metrics        — Prometheus metrics

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use eyre::Result;
use prometheus::{Encoder, TextEncoder};
use tracing::info;

use crate::dispatcher::Dispatcher;
use crate::metrics;
use crate::types::{BatchOutcome, NotificationBatch};

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/notifications", post(ingest))
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .with_state(dispatcher)
}

/// Bind and run the API server.
pub async fn serve(addr: &str, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server started");
    metrics::UP.set(1.0);
    axum::serve(listener, router(dispatcher)).await?;
    Ok(())
}

/// Acknowledges once every event in the batch has been dispatched.
/// Confirmation is asynchronous and reported via logs/metrics.
async fn ingest(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(batch): Json<NotificationBatch>,
) -> Json<BatchOutcome> {
    Json(dispatcher.handle_batch(batch).await)
}

async fn health() -> &'static str {
    "OK"
}

async fn metrics_text() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
