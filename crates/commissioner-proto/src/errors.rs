//! Protocol-level errors.

use thiserror::Error;

/// Result alias for protocol helpers.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while interpreting device-supplied data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Input ended before a complete element could be read
    #[error("truncated input at offset {offset}: need {needed} more bytes")]
    Truncated {
        /// Offset of the element that could not be read
        offset: usize,
        /// Bytes missing
        needed: usize,
    },

    /// A required TLV element was not present
    #[error("missing TLV element of type {0}")]
    MissingTlv(u8),

    /// A TLV element had the wrong length for its type
    #[error("TLV element {tlv} has length {actual}, expected {expected}")]
    InvalidLength {
        /// TLV type
        tlv: u8,
        /// Required length
        expected: usize,
        /// Observed length
        actual: usize,
    },

    /// A numeric value did not map to any known enumeration member
    #[error("unknown {kind} value {value}")]
    UnknownValue {
        /// Name of the enumeration
        kind: &'static str,
        /// Raw value
        value: u64,
    },

    /// CBOR envelope could not be encoded or decoded
    #[error("CBOR envelope: {0}")]
    Cbor(String),
}
