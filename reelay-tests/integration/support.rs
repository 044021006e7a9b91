//! Shared fixtures for integration tests

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use reelay_core::telemetry::{StreamSample, TelemetrySink};
use reelay_core::{ReelayConfig, TracingSink};
use reelay_web::AppState;
use tempfile::TempDir;

/// Sink that records everything for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    pub samples: Mutex<Vec<StreamSample>>,
    pub completions: Mutex<Vec<u64>>,
}

impl TelemetrySink for RecordingSink {
    fn sample(&self, sample: &StreamSample) {
        self.samples.lock().unwrap().push(*sample);
    }

    fn stream_complete(&self, total_bytes: u64) {
        self.completions.lock().unwrap().push(total_bytes);
    }
}

/// Deterministic, non-repeating-enough byte pattern for fixtures.
pub fn test_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Creates a media directory with the fixture files the tests expect.
pub async fn media_fixture() -> (TempDir, Vec<u8>) {
    let dir = TempDir::new().unwrap();
    let data = test_data(1000);

    tokio::fs::write(dir.path().join("movie.mp4"), &data)
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("subs.vtt"), b"WEBVTT\n\n")
        .await
        .unwrap();
    tokio::fs::create_dir(dir.path().join("shows")).await.unwrap();
    tokio::fs::write(dir.path().join("shows/ep1.ts"), test_data(300))
        .await
        .unwrap();

    (dir, data)
}

/// Spawns the real server on an ephemeral port with the given sink.
///
/// Uses the testing config (16-byte chunks, zero sample interval) so
/// even small fixtures stream in many chunks.
pub async fn spawn_server(root: &Path, sink: Arc<dyn TelemetrySink>) -> SocketAddr {
    let mut config = ReelayConfig::for_testing();
    config.server.media_root = root.to_path_buf();

    let state = AppState::new(config, sink).await.unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(reelay_web::serve(listener, state));
    addr
}

/// Spawns a server with the default tracing sink.
pub async fn spawn_default_server(root: &Path) -> SocketAddr {
    spawn_server(root, Arc::new(TracingSink)).await
}
