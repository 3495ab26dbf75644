//! Protocol error types.

use thiserror::Error;

/// Errors produced while encoding outbound data.
///
/// Inbound parsing never fails: malformed input is either discarded (bytes
/// outside a frame) or clamped (oversized bodies).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Formatted output would not fit the fixed line buffer.
    #[error("formatted line exceeds {capacity} byte buffer")]
    LineOverflow {
        /// Capacity of the buffer that rejected the write
        capacity: usize,
    },

    /// A frame body contains a start or end marker and cannot be framed.
    #[error("frame body contains marker byte {marker:#04x} at offset {offset}")]
    MarkerInBody {
        /// The offending marker byte
        marker: u8,
        /// Offset of the marker within the body
        offset: usize,
    },

    /// Writing the encoded frame failed.
    #[error("frame write failed: {0}")]
    Io(String),
}

/// Convenience alias for protocol results.
pub type Result<T> = std::result::Result<T, ProtocolError>;
