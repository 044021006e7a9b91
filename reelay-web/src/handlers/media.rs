//! Range-aware media file handler.
//!
//! Implements the request state machine: validate method and path,
//! resolve file metadata, validate the requested byte range *before*
//! opening the file, then hand a [`StreamSession`] to the response
//! body. Validation failures are rejected synchronously with no body;
//! failures after headers are committed surface only as an early end
//! of the byte stream, which players recover from by re-requesting
//! with a fresh range.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use reelay_core::config::StreamingConfig;
use reelay_core::range::parse_range;
use reelay_core::telemetry::PlaybackHints;
use reelay_core::{StreamSession, content_type_for};
use tracing::{debug, info, warn};

use crate::server::AppState;

/// Rejection taxonomy for the media handler.
///
/// All variants are detected before any response byte is sent.
/// Mid-stream failures (read errors, client disconnects) cannot change
/// the committed status line and are not represented here; they
/// terminate the body stream early instead.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// Only GET is served.
    #[error("Method not allowed: {method}")]
    InvalidMethod {
        /// The rejected request method.
        method: Method,
    },

    /// Path contained `..` or escaped the media root after resolution.
    #[error("Path rejected: {path}")]
    PathTraversalRejected {
        /// The offending request path.
        path: String,
    },

    /// No regular file at the resolved path.
    #[error("File not found: {path}")]
    FileNotFound {
        /// The request path that failed to resolve.
        path: String,
    },

    /// Range was syntactically valid but lies outside the file.
    #[error("Unsatisfiable range for file of {total_size} bytes")]
    UnsatisfiableRange {
        /// Size of the file the range was validated against.
        total_size: u64,
    },

    /// Response assembly failed.
    #[error("Response construction failed")]
    ResponseBuild,
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = match self {
            ServeError::InvalidMethod { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ServeError::PathTraversalRejected { .. } => StatusCode::FORBIDDEN,
            ServeError::FileNotFound { .. } => StatusCode::NOT_FOUND,
            ServeError::UnsatisfiableRange { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ServeError::ResponseBuild => StatusCode::INTERNAL_SERVER_ERROR,
        };
        status.into_response()
    }
}

/// Streams a file from the media root, honoring `Range` requests.
///
/// Mounted as the router fallback so every non-API path reaches it.
///
/// # Errors
/// - `ServeError::InvalidMethod` - request method is not GET
/// - `ServeError::PathTraversalRejected` - path contains `..` or
///   resolves outside the media root
/// - `ServeError::FileNotFound` - path does not name a regular file
/// - `ServeError::UnsatisfiableRange` - range start lies past the file
pub async fn serve_media(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ServeError> {
    if method != Method::GET {
        return Err(ServeError::InvalidMethod { method });
    }

    let raw_path = uri.path();
    let decoded = urlencoding::decode(raw_path)
        .map_err(|_| ServeError::FileNotFound {
            path: raw_path.to_string(),
        })?
        .into_owned();

    // Literal guard on both the raw and decoded path, then a
    // canonicalized containment check below. Belt and suspenders: the
    // substring check alone misses encoded variants.
    if raw_path.contains("..") || decoded.contains("..") {
        warn!(path = %raw_path, "rejected traversal attempt");
        return Err(ServeError::PathTraversalRejected {
            path: raw_path.to_string(),
        });
    }

    let file_path = state.media_root.join(decoded.trim_start_matches('/'));

    let metadata = tokio::fs::metadata(&file_path)
        .await
        .map_err(|_| ServeError::FileNotFound {
            path: decoded.clone(),
        })?;
    if !metadata.is_file() {
        return Err(ServeError::FileNotFound {
            path: decoded.clone(),
        });
    }

    let canonical = tokio::fs::canonicalize(&file_path)
        .await
        .map_err(|_| ServeError::FileNotFound {
            path: decoded.clone(),
        })?;
    if !canonical.starts_with(&state.media_root) {
        warn!(path = %decoded, resolved = %canonical.display(), "path escapes media root");
        return Err(ServeError::PathTraversalRejected { path: decoded });
    }

    let total_size = metadata.len();

    // Validate the range before opening the file so rejected requests
    // never hold a handle.
    let range_header = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());
    let window = parse_range(range_header, total_size)
        .map_err(|_| ServeError::UnsatisfiableRange { total_size })?;

    let file = tokio::fs::File::open(&canonical)
        .await
        .map_err(|_| ServeError::FileNotFound {
            path: decoded.clone(),
        })?;

    let hints = playback_hints(&query, &state.config.streaming);
    state.metrics.record_stream_started();
    let session = StreamSession::new(
        file,
        window,
        hints,
        &state.config.streaming,
        state.sink.clone(),
    );

    info!(
        path = %decoded,
        start = window.start,
        end = window.end,
        total_size,
        partial = window.is_partial(),
        "streaming"
    );
    debug!(bitrate = hints.bitrate_bps, fps = hints.target_fps, "playback hints");

    let mut response = Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(&decoded))
        .header(header::CONTENT_LENGTH, window.len().to_string())
        .header(header::ACCEPT_RANGES, "bytes");

    if window.is_partial() {
        response = response
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, window.to_string());
    } else {
        response = response.status(StatusCode::OK);
    }

    response
        .body(Body::from_stream(session.into_stream()))
        .map_err(|_| ServeError::ResponseBuild)
}

/// Extracts telemetry hints from query parameters.
///
/// Hints never affect correctness, so unparseable values silently fall
/// back to the configured defaults.
fn playback_hints(query: &HashMap<String, String>, config: &StreamingConfig) -> PlaybackHints {
    let bitrate_bps = query
        .get("bitrate")
        .and_then(|value| value.parse().ok())
        .unwrap_or(config.default_bitrate_bps);
    let target_fps = query
        .get("fps")
        .and_then(|value| value.parse().ok())
        .unwrap_or(config.default_fps);

    PlaybackHints {
        bitrate_bps,
        target_fps,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reelay_core::{ReelayConfig, TracingSink};
    use tempfile::TempDir;

    use super::*;

    fn test_data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn test_state(file_len: usize) -> (TempDir, AppState, Vec<u8>) {
        let dir = TempDir::new().unwrap();
        let data = test_data(file_len);
        tokio::fs::write(dir.path().join("clip.mp4"), &data)
            .await
            .unwrap();

        let mut config = ReelayConfig::for_testing();
        config.server.media_root = dir.path().to_path_buf();
        let state = AppState::new(config, Arc::new(TracingSink)).await.unwrap();
        (dir, state, data)
    }

    async fn call(
        state: &AppState,
        method: Method,
        uri: &str,
        range: Option<&str>,
    ) -> Result<Response, ServeError> {
        let mut headers = HeaderMap::new();
        if let Some(range) = range {
            headers.insert(header::RANGE, range.parse().unwrap());
        }
        serve_media(
            State(state.clone()),
            method,
            uri.parse::<Uri>().unwrap(),
            Query(HashMap::new()),
            headers,
        )
        .await
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_partial_request_gets_206_and_exact_window() {
        let (_dir, state, data) = test_state(1000).await;

        let response = call(&state, Method::GET, "/clip.mp4", Some("bytes=100-199"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes 100-199/1000"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "video/mp4"
        );
        assert_eq!(
            response.headers().get(header::ACCEPT_RANGES).unwrap(),
            "bytes"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_LENGTH).unwrap(),
            "100"
        );

        let body = body_bytes(response).await;
        assert_eq!(body, data[100..200].to_vec());
    }

    #[tokio::test]
    async fn test_no_range_header_gets_200_full_body() {
        let (_dir, state, data) = test_state(1000).await;

        let response = call(&state, Method::GET, "/clip.mp4", None).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CONTENT_RANGE).is_none());

        let body = body_bytes(response).await;
        assert_eq!(body, data);
    }

    #[tokio::test]
    async fn test_suffix_range() {
        let (_dir, state, data) = test_state(1000).await;

        let response = call(&state, Method::GET, "/clip.mp4", Some("bytes=-50"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes 950-999/1000"
        );
        assert_eq!(body_bytes(response).await, data[950..].to_vec());
    }

    #[tokio::test]
    async fn test_malformed_range_falls_back_to_full_file() {
        let (_dir, state, data) = test_state(1000).await;

        let response = call(&state, Method::GET, "/clip.mp4", Some("bytes=junk"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await.len(), data.len());
    }

    #[tokio::test]
    async fn test_unsatisfiable_range_rejected_before_streaming() {
        let (_dir, state, _data) = test_state(1000).await;

        let err = call(&state, Method::GET, "/clip.mp4", Some("bytes=2000-2100"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServeError::UnsatisfiableRange { total_size: 1000 }
        ));

        // Rejection happens before a session is ever constructed.
        assert_eq!(state.metrics.snapshot().streams_started, 0);
    }

    #[tokio::test]
    async fn test_non_get_method_rejected() {
        let (_dir, state, _data) = test_state(100).await;

        let err = call(&state, Method::POST, "/clip.mp4", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServeError::InvalidMethod { .. }));
    }

    #[tokio::test]
    async fn test_dotdot_path_rejected() {
        let (_dir, state, _data) = test_state(100).await;

        let err = call(&state, Method::GET, "/../etc/passwd", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServeError::PathTraversalRejected { .. }));
    }

    #[tokio::test]
    async fn test_encoded_dotdot_rejected() {
        let (_dir, state, _data) = test_state(100).await;

        let err = call(&state, Method::GET, "/%2e%2e/etc/passwd", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServeError::PathTraversalRejected { .. }));
    }

    #[tokio::test]
    async fn test_symlink_escaping_root_rejected() {
        let (dir, state, _data) = test_state(100).await;

        let outside = TempDir::new().unwrap();
        tokio::fs::write(outside.path().join("secret.txt"), b"secret")
            .await
            .unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.txt"),
            dir.path().join("link.txt"),
        )
        .unwrap();

        let err = call(&state, Method::GET, "/link.txt", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServeError::PathTraversalRejected { .. }));
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let (_dir, state, _data) = test_state(100).await;

        let err = call(&state, Method::GET, "/nope.mp4", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServeError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_directory_is_404() {
        let (_dir, state, _data) = test_state(100).await;

        let err = call(&state, Method::GET, "/", None).await.unwrap_err();
        assert!(matches!(err, ServeError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_percent_encoded_filename_resolves() {
        let (dir, state, _data) = test_state(100).await;
        tokio::fs::write(dir.path().join("my movie.mp4"), b"abc")
            .await
            .unwrap();

        let response = call(&state, Method::GET, "/my%20movie.mp4", None)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"abc");
    }

    #[tokio::test]
    async fn test_empty_file_served_as_200() {
        let (dir, state, _data) = test_state(100).await;
        tokio::fs::write(dir.path().join("empty.vtt"), b"").await.unwrap();

        let response = call(&state, Method::GET, "/empty.vtt", None).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_LENGTH).unwrap(),
            "0"
        );
        assert!(body_bytes(response).await.is_empty());
    }

    #[test]
    fn test_playback_hints_parsing() {
        let config = StreamingConfig::default();

        let mut query = HashMap::new();
        query.insert("bitrate".to_string(), "4000000".to_string());
        query.insert("fps".to_string(), "24".to_string());
        let hints = playback_hints(&query, &config);
        assert_eq!(hints.bitrate_bps, 4_000_000);
        assert_eq!(hints.target_fps, 24);

        // Unparseable values fall back to defaults.
        let mut query = HashMap::new();
        query.insert("bitrate".to_string(), "fast".to_string());
        let hints = playback_hints(&query, &config);
        assert_eq!(hints.bitrate_bps, 8_000_000);
        assert_eq!(hints.target_fps, 60);
    }
}
