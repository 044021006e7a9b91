//! JSON API endpoints for server observability

use axum::Json;
use axum::extract::State;
use reelay_core::telemetry::MetricsSnapshot;
use serde::Serialize;

use crate::server::AppState;

/// Payload returned by the stats endpoint.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Always "ok" while the server is answering.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Process-wide streaming counters.
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
}

/// Process-wide streaming statistics.
///
/// Counters only; per-stream telemetry goes through the configured
/// sink instead.
pub async fn api_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        status: "ok",
        uptime_secs: state.server_started_at.elapsed().as_secs(),
        metrics: state.metrics.snapshot(),
    })
}
