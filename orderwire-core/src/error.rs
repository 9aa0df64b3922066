//! Domain-specific error types for the orderwire transport.
//!
//! All fallible operations return `Result<T, WireError>`.
//! No panics on invalid input — every error is typed and recoverable.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the orderwire transport.
#[derive(Debug, Error)]
pub enum WireError {
    // ── Setup Errors ─────────────────────────────────────────────
    /// The listening endpoint could not be created or cleaned up.
    #[error("cannot bind endpoint {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No peer endpoint appeared within the connect deadline.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The peer endpoint exists but rejected the connection, or a
    /// single-shot connect found no endpoint at all.
    #[error("connection refused at {0}")]
    ConnectRefused(PathBuf),

    // ── Established-Connection Errors ────────────────────────────
    /// The peer closed the stream, or a hard I/O failure occurred on
    /// an established connection (including a zero-byte transfer).
    #[error("peer disconnected")]
    Disconnected,

    /// The I/O layer reported an error outside an established stream.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Framing Errors ───────────────────────────────────────────
    /// Fewer bytes available than a header requires.
    #[error("short header: need {needed} bytes, have {available}")]
    ShortHeader { needed: usize, available: usize },

    /// A bounds-checked read would run past the sealed end of a buffer.
    #[error("short read: need {needed} bytes, have {available}")]
    ShortRead { needed: usize, available: usize },

    /// A cursor seek target lies outside the written region.
    #[error("seek out of bounds: target {target}, sealed end {end}")]
    SeekOutOfBounds { target: usize, end: usize },

    /// Declared lengths are internally inconsistent with the received
    /// bytes. Fatal to the connection.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(&'static str),

    /// The declared envelope size exceeds the codec limit.
    #[error("envelope too large: {size} bytes (max {max})")]
    EnvelopeTooLarge { size: usize, max: usize },

    // ── Dispatch Errors ──────────────────────────────────────────
    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// A bound handler rejected a message, aborting the rest of the
    /// envelope's dispatch.
    #[error("handler failure: {0}")]
    Handler(String),

    // ── Serialization Errors ─────────────────────────────────────
    /// A record could not be encoded (e.g. a field too large for its
    /// wire representation).
    #[error("encoding error: {0}")]
    Encoding(String),

    /// UTF-8 conversion failed while decoding a string field.
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl WireError {
    /// Returns `true` when the error means the peer is gone and the
    /// connection's per-session state must be reset.
    pub fn is_disconnect(&self) -> bool {
        match self {
            WireError::Disconnected => true,
            WireError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for WireError {
    fn from(s: String) -> Self {
        WireError::Other(s)
    }
}

impl From<&str> for WireError {
    fn from(s: &str) -> Self {
        WireError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = WireError::ShortHeader {
            needed: 8,
            available: 3,
        };
        assert!(e.to_string().contains("8"));
        assert!(e.to_string().contains("3"));

        let e = WireError::EnvelopeTooLarge {
            size: 1000,
            max: 500,
        };
        assert!(e.to_string().contains("1000"));
        assert!(e.to_string().contains("500"));
    }

    #[test]
    fn from_string() {
        let e: WireError = "something broke".into();
        assert!(matches!(e, WireError::Other(_)));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: WireError = io_err.into();
        assert!(matches!(e, WireError::Io(_)));
        assert!(e.is_disconnect());
    }

    #[test]
    fn disconnect_classification() {
        assert!(WireError::Disconnected.is_disconnect());
        assert!(!WireError::MalformedEnvelope("bad").is_disconnect());
        assert!(
            !WireError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied"
            ))
            .is_disconnect()
        );
    }
}
