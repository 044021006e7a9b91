//! Content-type resolution from file paths.
//!
//! Uses a fixed ordered substring table instead of a full MIME
//! database: the handful of types a media server actually serves,
//! first match wins, everything else is an octet stream.

/// Ordered lookup table. Order matters: earlier entries shadow later
/// ones (".ts" must not run before ".mp4" would, and ".jpeg" is
/// covered by ".jpg"/".jpeg" pair entries).
const CONTENT_TYPES: &[(&str, &str)] = &[
    (".mp4", "video/mp4"),
    (".m3u8", "application/x-mpegURL"),
    (".ts", "video/mp2t"),
    (".html", "text/html; charset=utf-8"),
    (".js", "application/javascript"),
    (".css", "text/css"),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".png", "image/png"),
    (".gif", "image/gif"),
    (".vtt", "text/vtt; charset=utf-8"),
    (".srt", "application/x-subrip"),
];

/// Fallback for anything the table does not cover.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Resolve the content type for a request path.
///
/// Matches case-insensitively against the fixed table; the first
/// matching entry wins.
pub fn content_type_for(path: &str) -> &'static str {
    let path = path.to_ascii_lowercase();
    CONTENT_TYPES
        .iter()
        .find(|(pattern, _)| path.contains(pattern))
        .map(|(_, content_type)| *content_type)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}
