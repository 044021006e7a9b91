//! Server wiring: shared state, router construction, and the accept
//! loop.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use reelay_core::telemetry::{ServerMetrics, StreamSample, TelemetrySink};
use reelay_core::{ReelayConfig, TracingSink};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::handlers::{api_stats, serve_media};

/// Shared state handed to every request handler.
///
/// Per-stream state never lives here; each response body owns its own
/// session. The only cross-request state is the metrics counters and
/// the telemetry sink, both safe for concurrent use.
#[derive(Clone)]
pub struct AppState {
    /// Canonicalized root directory media is served from.
    pub media_root: PathBuf,
    /// Full server configuration.
    pub config: ReelayConfig,
    /// Process-wide streaming counters.
    pub metrics: Arc<ServerMetrics>,
    /// Telemetry sink shared by all streams, already wrapped so that
    /// completed streams feed the metrics counters.
    pub sink: Arc<dyn TelemetrySink>,
    /// When the server state was constructed, for uptime reporting.
    pub server_started_at: std::time::Instant,
}

impl AppState {
    /// Builds state for the given configuration and sink.
    ///
    /// Canonicalizes the media root up front so the per-request
    /// containment check compares resolved paths.
    ///
    /// # Errors
    /// Returns the underlying I/O error when the media root does not
    /// exist or cannot be canonicalized.
    pub async fn new(
        config: ReelayConfig,
        sink: Arc<dyn TelemetrySink>,
    ) -> std::io::Result<Self> {
        let media_root = tokio::fs::canonicalize(&config.server.media_root).await?;
        let metrics = Arc::new(ServerMetrics::default());
        let sink = Arc::new(MetricsSink {
            metrics: Arc::clone(&metrics),
            inner: sink,
        });

        Ok(Self {
            media_root,
            config,
            metrics,
            sink,
            server_started_at: std::time::Instant::now(),
        })
    }
}

/// Sink decorator that feeds completed streams into the process-wide
/// counters before forwarding to the configured sink.
struct MetricsSink {
    metrics: Arc<ServerMetrics>,
    inner: Arc<dyn TelemetrySink>,
}

impl TelemetrySink for MetricsSink {
    fn sample(&self, sample: &StreamSample) {
        self.inner.sample(sample);
    }

    fn stream_complete(&self, total_bytes: u64) {
        self.metrics.record_stream_complete(total_bytes);
        self.inner.stream_complete(total_bytes);
    }
}

/// Builds the application router.
///
/// The stats endpoint is the only reserved path; everything else falls
/// through to the media handler.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/stats", get(api_stats))
        .fallback(serve_media)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves requests on an already-bound listener until the task is
/// cancelled. Split from [`run_server`] so tests can bind an
/// ephemeral port first.
///
/// # Errors
/// Returns any error from the underlying accept loop.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> std::io::Result<()> {
    let app = build_router(state);
    axum::serve(listener, app).await
}

/// Binds the configured address and runs the server with the default
/// tracing-backed telemetry sink.
///
/// # Errors
/// - media root missing or not canonicalizable
/// - listener failed to bind
/// - accept loop failure
pub async fn run_server(config: ReelayConfig) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, Arc::new(TracingSink)).await?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let bound = listener.local_addr()?;
    info!(
        addr = %bound,
        media_root = %state.media_root.display(),
        "reelay media server running"
    );
    info!("optional query params for fps estimation: ?bitrate=8000000&fps=60");

    serve(listener, state).await
}
