//! Centralized configuration for Reelay.
//!
//! All tunable parameters are defined here to avoid hard-coded values
//! scattered throughout the codebase.

use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for all Reelay components.
///
/// Groups related settings into logical sections and supports
/// environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct ReelayConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Streaming pipeline settings.
    pub streaming: StreamingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to.
    pub host: String,
    /// Port to bind the listener to.
    pub port: u16,
    /// Root directory media files are served from.
    pub media_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            media_root: PathBuf::from("media"),
        }
    }
}

/// Streaming pipeline configuration.
///
/// Controls chunking, telemetry cadence, and the default playback
/// hints used for the frame-rate estimate when a client supplies none.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Maximum bytes read from disk per pull.
    pub chunk_size: usize,
    /// Minimum wall time between telemetry samples on one stream.
    pub sample_interval: Duration,
    /// Default estimated media bitrate in bits per second.
    pub default_bitrate_bps: u64,
    /// Default playback frame rate used for the fps estimate.
    pub default_fps: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024, // 64 KiB
            sample_interval: Duration::from_millis(450),
            default_bitrate_bps: 8_000_000, // 8 Mbps
            default_fps: 60,
        }
    }
}

impl ReelayConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via `REELAY_*` environment
    /// variables while maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("REELAY_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("REELAY_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.server.port = port;
            }
        }

        if let Ok(root) = std::env::var("REELAY_MEDIA_ROOT") {
            config.server.media_root = PathBuf::from(root);
        }

        if let Ok(chunk) = std::env::var("REELAY_CHUNK_SIZE") {
            if let Ok(bytes) = chunk.parse::<usize>() {
                if bytes > 0 {
                    config.streaming.chunk_size = bytes;
                }
            }
        }

        config
    }

    /// Creates a configuration optimized for testing.
    ///
    /// Uses a tiny chunk size so multi-chunk behavior is exercised on
    /// small fixtures, and a zero sample interval so telemetry fires
    /// on every pull.
    pub fn for_testing() -> Self {
        Self {
            streaming: StreamingConfig {
                chunk_size: 16,
                sample_interval: Duration::ZERO,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
