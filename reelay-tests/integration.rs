//! Integration tests for Reelay
//!
//! Black-box tests that spawn the real server over a temporary media
//! directory and drive it with an HTTP client, verifying range
//! semantics, header assembly, rejection behavior, and telemetry
//! isolation across concurrent streams.

#[path = "integration/support.rs"]
mod support;

#[path = "integration/streaming_http.rs"]
mod streaming_http;

#[path = "integration/stream_telemetry.rs"]
mod stream_telemetry;
