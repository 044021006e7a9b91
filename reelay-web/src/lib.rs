//! Reelay Web - HTTP surface for range-aware media streaming
//!
//! Serves files from a configured media root with full byte-range
//! support, streaming response bodies in bounded chunks and reporting
//! per-stream telemetry through an injected sink.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]

pub mod handlers;
pub mod server;

// Re-export main types
pub use server::{AppState, build_router, run_server, serve};
