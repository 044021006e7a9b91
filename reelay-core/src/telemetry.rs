//! Per-stream and process-wide streaming telemetry.
//!
//! Each active stream periodically reports instantaneous throughput
//! and a heuristic frame-rate estimate through an injected
//! [`TelemetrySink`], so tests can capture samples without parsing
//! console output. The estimates are display metrics only and never
//! influence flow control or response framing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Client-supplied playback hints used only for the fps estimate.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackHints {
    /// Estimated media bitrate in bits per second.
    pub bitrate_bps: u64,
    /// Target playback frame rate.
    pub target_fps: u32,
}

/// One telemetry observation from an active stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreamSample {
    /// Instantaneous throughput since the previous sample, in MiB/s.
    pub throughput_mbps: f64,
    /// Estimated frames per second derivable from the throughput and
    /// the client's playback hints. Zero when no estimate is possible.
    pub estimated_fps: f64,
    /// Cumulative bytes delivered on this stream so far.
    pub total_bytes: u64,
}

/// Observer for stream telemetry.
///
/// One sink is shared by all concurrent streams; implementations must
/// tolerate concurrent calls.
pub trait TelemetrySink: Send + Sync {
    /// Called at a bounded rate while a stream is delivering bytes.
    fn sample(&self, sample: &StreamSample);

    /// Called exactly once when a stream ends, whether it completed,
    /// failed mid-read, or the client disconnected.
    fn stream_complete(&self, total_bytes: u64);
}

/// Production sink that emits samples as structured log events.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn sample(&self, sample: &StreamSample) {
        tracing::info!(
            throughput_mbps = format_args!("{:.2}", sample.throughput_mbps),
            estimated_fps = format_args!("{:.1}", sample.estimated_fps),
            total_mb = format_args!("{:.2}", sample.total_bytes as f64 / 1_048_576.0),
            "stream telemetry"
        );
    }

    fn stream_complete(&self, total_bytes: u64) {
        tracing::info!(
            total_mb = format_args!("{:.2}", total_bytes as f64 / 1_048_576.0),
            "stream complete"
        );
    }
}

/// Computes one sample from the bytes accumulated since the last one.
///
/// The fps estimate divides the observed byte rate by the bytes one
/// frame occupies at the hinted bitrate. A zero `target_fps` or zero
/// elapsed time yields a zero estimate rather than an error.
pub fn compute_sample(
    bytes_since_sample: u64,
    elapsed: Duration,
    total_bytes: u64,
    hints: PlaybackHints,
) -> StreamSample {
    let elapsed_secs = elapsed.as_secs_f64();
    let bytes_per_sec = if elapsed_secs > 0.0 {
        bytes_since_sample as f64 / elapsed_secs
    } else {
        0.0
    };

    let bytes_per_frame = if hints.target_fps == 0 {
        0.0
    } else {
        hints.bitrate_bps as f64 / hints.target_fps as f64 / 8.0
    };

    let estimated_fps = if bytes_per_frame > 0.0 {
        bytes_per_sec / bytes_per_frame
    } else {
        0.0
    };

    StreamSample {
        throughput_mbps: bytes_per_sec / 1_048_576.0,
        estimated_fps,
        total_bytes,
    }
}

/// Process-wide streaming counters, shared by all sessions.
///
/// Plain atomics: every session bumps these, the stats endpoint reads
/// them, nothing ever blocks on them.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    streams_started: AtomicU64,
    streams_completed: AtomicU64,
    bytes_served: AtomicU64,
}

/// Point-in-time copy of [`ServerMetrics`] for the stats endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    /// Streams accepted since startup.
    pub streams_started: u64,
    /// Streams that have finished, including early terminations.
    pub streams_completed: u64,
    /// Cumulative client-facing bytes delivered.
    pub bytes_served: u64,
}

impl ServerMetrics {
    /// Records a newly accepted stream.
    pub fn record_stream_started(&self) {
        self.streams_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a finished stream and its cumulative byte count.
    pub fn record_stream_complete(&self, total_bytes: u64) {
        self.streams_completed.fetch_add(1, Ordering::Relaxed);
        self.bytes_served.fetch_add(total_bytes, Ordering::Relaxed);
    }

    /// Returns a consistent-enough snapshot for display purposes.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            streams_started: self.streams_started.load(Ordering::Relaxed),
            streams_completed: self.streams_completed.load(Ordering::Relaxed),
            bytes_served: self.bytes_served.load(Ordering::Relaxed),
        }
    }
}
