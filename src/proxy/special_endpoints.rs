//! Built-in endpoints answered before the negotiation pipeline
//!
//! - `/health` - liveness with uptime and version
//! - `/metrics` - Prometheus metrics export

use http::StatusCode;
use std::time::Instant;

use super::response::ImageResponse;
use crate::metrics::Metrics;

pub const HEALTH_PATH: &str = "/health";
pub const METRICS_PATH: &str = "/metrics";

/// Generate response for /health endpoint.
pub fn handle_health(start_time: Instant) -> ImageResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    });

    ImageResponse::json(StatusCode::OK, &body)
}

/// Generate response for /metrics endpoint.
pub fn handle_metrics(metrics: &Metrics) -> ImageResponse {
    ImageResponse::prometheus(metrics.export_prometheus())
}
