//! HTTP Range header parsing for media streaming
//!
//! Implements the subset of RFC 7233 byte-range requests that media
//! players actually send: `bytes=start-end`, `bytes=start-` and the
//! suffix form `bytes=-n`. Malformed headers fall back to the full
//! file rather than failing the request; only syntactically valid but
//! unsatisfiable ranges are rejected.

use std::fmt;

/// Validated byte window into a source file.
///
/// Invariant: `start <= end < total_size` whenever `total_size > 0`.
/// For an empty file the window is degenerate and `len()` is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteWindow {
    /// First byte offset served, inclusive.
    pub start: u64,
    /// Last byte offset served, inclusive.
    pub end: u64,
    /// Total size of the underlying file.
    pub total_size: u64,
    partial: bool,
}

impl ByteWindow {
    /// Window covering the whole file, as used when no `Range` header
    /// is present.
    pub fn full(total_size: u64) -> Self {
        Self {
            start: 0,
            end: total_size.saturating_sub(1),
            total_size,
            partial: false,
        }
    }

    /// Number of bytes the window covers. This is the exact
    /// `Content-Length` of the response.
    pub fn len(&self) -> u64 {
        if self.total_size == 0 {
            0
        } else {
            self.end - self.start + 1
        }
    }

    /// True when the window covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the window came from a valid `Range` header and the
    /// response should use partial-content status.
    pub fn is_partial(&self) -> bool {
        self.partial
    }
}

impl fmt::Display for ByteWindow {
    /// Formats the window as a `Content-Range` header value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}-{}/{}", self.start, self.end, self.total_size)
    }
}

/// Errors from range validation.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RangeError {
    /// The requested range lies outside the file.
    #[error("Unsatisfiable range {start}-{end}, file size is {total_size}")]
    Unsatisfiable {
        /// Requested start offset.
        start: u64,
        /// Requested end offset.
        end: u64,
        /// Total file size the range was validated against.
        total_size: u64,
    },
}

/// Parse an optional `Range` header value against a file of
/// `total_size` bytes.
///
/// Absent or malformed headers yield the full-file window. A parsed
/// end offset past the file is clamped to the last byte. Suffix
/// requests longer than the file are clamped to the whole file.
///
/// # Errors
/// - `RangeError::Unsatisfiable` - `start > end` or `start` is at or
///   past the end of the file
///
/// # Examples
/// ```
/// use reelay_core::range::parse_range;
/// let window = parse_range(Some("bytes=100-199"), 1000).unwrap();
/// assert_eq!((window.start, window.end, window.len()), (100, 199, 100));
/// ```
pub fn parse_range(header: Option<&str>, total_size: u64) -> Result<ByteWindow, RangeError> {
    let Some(header) = header else {
        return Ok(ByteWindow::full(total_size));
    };

    let Some(spec) = header.strip_prefix("bytes=") else {
        return Ok(ByteWindow::full(total_size));
    };

    let Some((start_str, end_str)) = spec.split_once('-') else {
        return Ok(ByteWindow::full(total_size));
    };

    let (start, end) = if start_str.is_empty() {
        // Suffix form "-n" requests the last n bytes.
        let Ok(suffix) = end_str.trim().parse::<u64>() else {
            return Ok(ByteWindow::full(total_size));
        };
        let start = if suffix >= total_size {
            0
        } else {
            total_size - suffix
        };
        (start, total_size.saturating_sub(1))
    } else {
        let Ok(start) = start_str.trim().parse::<u64>() else {
            return Ok(ByteWindow::full(total_size));
        };
        let end = if end_str.is_empty() {
            total_size.saturating_sub(1)
        } else {
            let Ok(end) = end_str.trim().parse::<u64>() else {
                return Ok(ByteWindow::full(total_size));
            };
            end
        };
        (start, end)
    };

    if start > end || start >= total_size {
        return Err(RangeError::Unsatisfiable {
            start,
            end,
            total_size,
        });
    }

    Ok(ByteWindow {
        start,
        // Never serve past the last byte, even if the client asked.
        end: end.min(total_size - 1),
        total_size,
        partial: true,
    })
}
