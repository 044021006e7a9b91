//! Per-request stream sessions and the chunked byte producer.
//!
//! A [`StreamSession`] exclusively owns one open file handle and a
//! validated byte window into it for the lifetime of one HTTP
//! response. [`StreamSession::into_stream`] turns the session into a
//! finite, non-restartable sequence of byte chunks suitable for a
//! streaming response body: each pull seeks to the current position,
//! reads at most one chunk, never crosses the window boundary, and
//! opportunistically fires a telemetry sample.
//!
//! Seeking on every pull is deliberate: it keeps each pull correct
//! even if the host framework drives pulls from different threads,
//! at the cost of one cheap seek per chunk.

use std::io::{self, SeekFrom};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;
use futures::{Stream, stream};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::config::StreamingConfig;
use crate::range::ByteWindow;
use crate::telemetry::{PlaybackHints, TelemetrySink, compute_sample};

/// Mutable state owned by one streaming response.
///
/// No two sessions share a file handle, and a session never outlives
/// its response body. Counters are atomic as defense against a host
/// framework polling the body from more than one thread; ordinary
/// operation is single-writer.
pub struct StreamSession {
    core: SessionCore,
    /// Next byte offset to deliver, relative to the window start.
    cursor: u64,
}

struct SessionCore {
    file: File,
    window: ByteWindow,
    chunk_size: usize,
    sample_interval: std::time::Duration,
    hints: PlaybackHints,
    bytes_delivered_total: AtomicU64,
    bytes_since_sample: AtomicU64,
    last_sample: Mutex<Instant>,
    sink: Arc<dyn TelemetrySink>,
}

impl Drop for SessionCore {
    // Runs exactly once per session: on completed streams, mid-stream
    // read failures, and client disconnects alike. The file handle
    // closes with the struct.
    fn drop(&mut self) {
        let total = self.bytes_delivered_total.load(Ordering::Relaxed);
        self.sink.stream_complete(total);
    }
}

impl StreamSession {
    /// Creates a session over an already-validated window of an open
    /// file. The session takes exclusive ownership of the handle.
    pub fn new(
        file: File,
        window: ByteWindow,
        hints: PlaybackHints,
        config: &StreamingConfig,
        sink: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            core: SessionCore {
                file,
                window,
                chunk_size: config.chunk_size,
                sample_interval: config.sample_interval,
                hints,
                bytes_delivered_total: AtomicU64::new(0),
                bytes_since_sample: AtomicU64::new(0),
                last_sample: Mutex::new(Instant::now()),
                sink,
            },
            cursor: 0,
        }
    }

    /// The byte window this session serves.
    pub fn window(&self) -> ByteWindow {
        self.core.window
    }

    /// Client-facing bytes delivered so far.
    pub fn bytes_delivered(&self) -> u64 {
        self.core.bytes_delivered_total.load(Ordering::Relaxed)
    }

    /// Consumes the session into a finite stream of byte chunks.
    ///
    /// The stream yields exactly `window.len()` bytes unless the
    /// underlying file shrinks mid-stream, in which case it ends
    /// early. A read error is yielded once and then the stream ends;
    /// nothing is retried.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, io::Error>> + Send {
        stream::unfold(self, |mut session| async move {
            match session.pull_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), session)),
                Ok(None) => None,
                Err(e) => {
                    session.cursor = session.core.window.len();
                    Some((Err(e), session))
                }
            }
        })
    }

    /// Delivers the next chunk, or `None` at end of stream.
    async fn pull_chunk(&mut self) -> io::Result<Option<Bytes>> {
        let remaining = self.core.window.len().saturating_sub(self.cursor);
        if remaining == 0 {
            return Ok(None);
        }

        let absolute = self.core.window.start + self.cursor;
        self.core.file.seek(SeekFrom::Start(absolute)).await?;

        let want = remaining.min(self.core.chunk_size as u64) as usize;
        let mut buf = vec![0u8; want];
        let read = self.core.file.read(&mut buf).await?;

        if read == 0 {
            // File shorter than the window (truncated underneath us):
            // degrade to end-of-stream rather than erroring.
            self.cursor = self.core.window.len();
            return Ok(None);
        }

        buf.truncate(read);
        self.cursor += read as u64;
        self.core.record_delivery(read as u64);

        Ok(Some(Bytes::from(buf)))
    }
}

impl SessionCore {
    /// Bumps delivery counters and fires a telemetry sample when the
    /// configured interval has elapsed since the last one.
    fn record_delivery(&self, delivered: u64) {
        self.bytes_delivered_total
            .fetch_add(delivered, Ordering::Relaxed);
        self.bytes_since_sample
            .fetch_add(delivered, Ordering::Relaxed);

        let now = Instant::now();
        let sample = {
            let mut last = match self.last_sample.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let elapsed = now.duration_since(*last);
            if elapsed < self.sample_interval {
                return;
            }
            *last = now;
            let since = self.bytes_since_sample.swap(0, Ordering::Relaxed);
            compute_sample(
                since,
                elapsed,
                self.bytes_delivered_total.load(Ordering::Relaxed),
                self.hints,
            )
        };
        self.sink.sample(&sample);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use tempfile::TempDir;

    use super::*;
    use crate::config::ReelayConfig;
    use crate::range::parse_range;
    use crate::telemetry::StreamSample;

    /// Sink that records everything it is handed.
    #[derive(Default)]
    struct RecordingSink {
        samples: Mutex<Vec<StreamSample>>,
        completions: Mutex<Vec<u64>>,
    }

    impl TelemetrySink for RecordingSink {
        fn sample(&self, sample: &StreamSample) {
            self.samples.lock().unwrap().push(*sample);
        }

        fn stream_complete(&self, total_bytes: u64) {
            self.completions.lock().unwrap().push(total_bytes);
        }
    }

    fn test_data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn fixture(len: usize) -> (TempDir, std::path::PathBuf, Vec<u8>) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        let data = test_data(len);
        tokio::fs::write(&path, &data).await.unwrap();
        (dir, path, data)
    }

    async fn open_session(
        path: &std::path::Path,
        header: Option<&str>,
        chunk_size: usize,
        sink: Arc<RecordingSink>,
    ) -> StreamSession {
        let size = tokio::fs::metadata(path).await.unwrap().len();
        let window = parse_range(header, size).unwrap();
        let file = File::open(path).await.unwrap();
        let config = StreamingConfig {
            chunk_size,
            sample_interval: Duration::ZERO,
            ..Default::default()
        };
        let hints = PlaybackHints {
            bitrate_bps: config.default_bitrate_bps,
            target_fps: config.default_fps,
        };
        StreamSession::new(file, window, hints, &config, sink)
    }

    async fn collect_bytes(session: StreamSession) -> Vec<u8> {
        session
            .into_stream()
            .map(|chunk| chunk.unwrap().to_vec())
            .collect::<Vec<_>>()
            .await
            .concat()
    }

    #[tokio::test]
    async fn test_bounded_range_delivers_exact_window() {
        let (_dir, path, data) = fixture(1000).await;
        let sink = Arc::new(RecordingSink::default());

        let session = open_session(&path, Some("bytes=100-199"), 16, sink.clone()).await;
        let body = collect_bytes(session).await;

        assert_eq!(body.len(), 100);
        assert_eq!(body[0], data[100]);
        assert_eq!(body, data[100..200].to_vec());
    }

    #[tokio::test]
    async fn test_full_file_delivery() {
        let (_dir, path, data) = fixture(1000).await;
        let sink = Arc::new(RecordingSink::default());

        let session = open_session(&path, None, 64, sink.clone()).await;
        let body = collect_bytes(session).await;

        assert_eq!(body, data);
    }

    #[tokio::test]
    async fn test_suffix_range_delivers_trailing_bytes() {
        let (_dir, path, data) = fixture(1000).await;
        let sink = Arc::new(RecordingSink::default());

        let session = open_session(&path, Some("bytes=-50"), 16, sink.clone()).await;
        assert_eq!(session.window().start, 950);
        let body = collect_bytes(session).await;

        assert_eq!(body, data[950..].to_vec());
    }

    #[tokio::test]
    async fn test_chunk_size_larger_than_window_is_clamped() {
        let (_dir, path, data) = fixture(1000).await;
        let sink = Arc::new(RecordingSink::default());

        let session = open_session(&path, Some("bytes=10-19"), 65536, sink.clone()).await;
        let mut stream = Box::pin(session.into_stream());

        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk.len(), 10);
        assert_eq!(chunk.to_vec(), data[10..20].to_vec());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_completion_fires_exactly_once() {
        let (_dir, path, _data) = fixture(1000).await;
        let sink = Arc::new(RecordingSink::default());

        let session = open_session(&path, Some("bytes=0-99"), 16, sink.clone()).await;
        let body = collect_bytes(session).await;
        assert_eq!(body.len(), 100);

        let completions = sink.completions.lock().unwrap();
        assert_eq!(completions.as_slice(), &[100]);
    }

    #[tokio::test]
    async fn test_dropped_stream_still_reports_completion() {
        let (_dir, path, _data) = fixture(1000).await;
        let sink = Arc::new(RecordingSink::default());

        let session = open_session(&path, None, 64, sink.clone()).await;
        let mut stream = Box::pin(session.into_stream());
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 64);
        drop(stream); // simulated client disconnect

        let completions = sink.completions.lock().unwrap();
        assert_eq!(completions.as_slice(), &[64]);
    }

    #[tokio::test]
    async fn test_truncated_file_degrades_to_end_of_stream() {
        let (_dir, path, _data) = fixture(1000).await;
        let sink = Arc::new(RecordingSink::default());

        let session = open_session(&path, None, 64, sink.clone()).await;

        // Shrink the file after the session opened its handle.
        let handle = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        handle.set_len(500).unwrap();

        let body = collect_bytes(session).await;
        assert_eq!(body.len(), 500);

        let completions = sink.completions.lock().unwrap();
        assert_eq!(completions.as_slice(), &[500]);
    }

    #[tokio::test]
    async fn test_sampler_fires_per_chunk_at_zero_interval() {
        let (_dir, path, _data) = fixture(256).await;
        let sink = Arc::new(RecordingSink::default());

        let session = open_session(&path, None, 64, sink.clone()).await;
        collect_bytes(session).await;

        let samples = sink.samples.lock().unwrap();
        assert_eq!(samples.len(), 4); // 256 bytes in 64-byte chunks
        // Cumulative totals are monotone and end at the full size.
        for pair in samples.windows(2) {
            assert!(pair[0].total_bytes <= pair[1].total_bytes);
        }
        assert_eq!(samples.last().unwrap().total_bytes, 256);
    }

    #[tokio::test]
    async fn test_sampler_respects_interval() {
        let (_dir, path, _data) = fixture(1000).await;
        let sink = Arc::new(RecordingSink::default());

        let size = tokio::fs::metadata(&path).await.unwrap().len();
        let window = parse_range(None, size).unwrap();
        let file = File::open(&path).await.unwrap();
        let config = StreamingConfig {
            chunk_size: 64,
            sample_interval: Duration::from_secs(3600),
            ..Default::default()
        };
        let hints = PlaybackHints {
            bitrate_bps: 8_000_000,
            target_fps: 60,
        };
        let session = StreamSession::new(file, window, hints, &config, sink.clone());
        collect_bytes(session).await;

        assert!(sink.samples.lock().unwrap().is_empty());
        assert_eq!(sink.completions.lock().unwrap().as_slice(), &[1000]);
    }

    #[tokio::test]
    async fn test_concurrent_sessions_do_not_share_counters() {
        let (_dir, path, data) = fixture(1000).await;
        let sink_a = Arc::new(RecordingSink::default());
        let sink_b = Arc::new(RecordingSink::default());

        let a = open_session(&path, Some("bytes=0-99"), 16, sink_a.clone()).await;
        let b = open_session(&path, Some("bytes=500-899"), 16, sink_b.clone()).await;

        let (body_a, body_b) = tokio::join!(collect_bytes(a), collect_bytes(b));

        assert_eq!(body_a, data[0..100].to_vec());
        assert_eq!(body_b, data[500..900].to_vec());
        assert_eq!(sink_a.completions.lock().unwrap().as_slice(), &[100]);
        assert_eq!(sink_b.completions.lock().unwrap().as_slice(), &[400]);
    }

    #[tokio::test]
    async fn test_testing_config_exercises_multiple_chunks() {
        let (_dir, path, data) = fixture(100).await;
        let sink = Arc::new(RecordingSink::default());

        let config = ReelayConfig::for_testing();
        let size = tokio::fs::metadata(&path).await.unwrap().len();
        let window = parse_range(None, size).unwrap();
        let file = File::open(&path).await.unwrap();
        let hints = PlaybackHints {
            bitrate_bps: config.streaming.default_bitrate_bps,
            target_fps: config.streaming.default_fps,
        };
        let session = StreamSession::new(file, window, hints, &config.streaming, sink.clone());

        let body = collect_bytes(session).await;
        assert_eq!(body, data);
    }
}
