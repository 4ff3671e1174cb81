//! Error types for encoding and decoding

use thiserror::Error;

/// Main error type for freezer operations.
///
/// Every error aborts the whole top-level call; there is no partial output.
#[derive(Error, Debug)]
pub enum FreezerError {
    /// Malformed input: bad magic, truncation, bad tag, negative size,
    /// bad byte-order or version marker.
    #[error("Format error: {0}")]
    Format(String),

    /// The codec returned a value of the wrong kind, or could not resolve
    /// a value that has no structural fallback.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Inconsistent program structure: out-of-order member offsets,
    /// references to unknown members, unfinished inherits.
    #[error("Graph error: {0}")]
    Graph(String),

    /// Request the codec cannot honour, such as canonical encoding of an
    /// identity-bearing value.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Value nesting went past the configured limit
    #[error("Maximum nesting depth exceeded ({max_depth})")]
    DepthExceeded {
        /// Configured limit
        max_depth: usize,
    },
}

impl FreezerError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        FreezerError::Format(msg.into())
    }

    pub(crate) fn codec(msg: impl Into<String>) -> Self {
        FreezerError::Codec(msg.into())
    }

    pub fn graph(msg: impl Into<String>) -> Self {
        FreezerError::Graph(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        FreezerError::Unsupported(msg.into())
    }

    /// True for errors caused by the input bytes themselves.
    pub fn is_format(&self) -> bool {
        matches!(self, FreezerError::Format(_))
    }
}

/// Result type alias for freezer operations
pub type Result<T> = std::result::Result<T, FreezerError>;
