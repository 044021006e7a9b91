//! Reelay Core - Range-aware media streaming pipeline
//!
//! This crate provides the building blocks for serving media files over
//! HTTP with byte-range support: range parsing, content-type resolution,
//! per-request stream sessions with bounded chunked reads, and live
//! per-stream telemetry.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]

pub mod config;
pub mod mime;
pub mod range;
pub mod session;
pub mod telemetry;

// Re-export main types for convenient access
pub use config::ReelayConfig;
pub use mime::content_type_for;
pub use range::{ByteWindow, RangeError};
pub use session::StreamSession;
pub use telemetry::{PlaybackHints, ServerMetrics, StreamSample, TelemetrySink, TracingSink};

/// Core errors that can bubble up from any Reelay subsystem.
#[derive(Debug, thiserror::Error)]
pub enum ReelayError {
    /// Range header validation failed.
    #[error("Range error: {0}")]
    Range(#[from] RangeError),

    /// Underlying file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration was invalid or incomplete.
    #[error("Configuration error: {reason}")]
    Configuration {
        /// Human-readable description of the problem.
        reason: String,
    },
}

/// Convenience result alias for core operations.
pub type Result<T> = std::result::Result<T, ReelayError>;
