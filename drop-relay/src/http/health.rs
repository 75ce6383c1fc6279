//! Health check endpoint.

use crate::server::DropRelay;
use crate::storage::{current_timestamp, ShareStorage};
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Global start time for uptime calculation.
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call once at startup).
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall status ("ok", or "degraded" when storage is unreachable).
    pub status: String,
    /// Server version.
    pub version: String,
    /// Number of live shares.
    pub shares: u64,
    /// Clients tracked by the rate limiters.
    pub tracked_clients: usize,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Health check handler.
pub async fn health_handler(Extension(relay): Extension<Arc<DropRelay>>) -> Json<HealthStatus> {
    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    let (status, shares) = match relay.storage().share_count(current_timestamp()).await {
        Ok(count) => ("ok", count),
        Err(e) => {
            tracing::warn!("Health check could not reach storage: {}", e);
            ("degraded", 0)
        }
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        shares,
        tracked_clients: relay.rate_limits().tracked_clients(),
        uptime_seconds: uptime,
    })
}
