//! HTTP request handlers organized by functionality

pub mod api;
pub mod media;

// Re-export handler functions
pub use api::{StatsResponse, api_stats};
pub use media::{ServeError, serve_media};
