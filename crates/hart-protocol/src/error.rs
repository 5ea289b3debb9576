//! Error types for the HART protocol layers.

use thiserror::Error;

use crate::frame::FrameFormat;

/// Errors raised by the primitive value codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The requested type is outside the set the codec supports.
    #[error("type not supported: {0}")]
    UnsupportedType(String),

    /// Value or buffer length outside the accepted range.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// No input buffer was supplied to decode.
    #[error("missing input buffer")]
    MissingInput,
}

impl CodecError {
    /// Create an out-of-range error.
    pub fn out_of_range(message: impl Into<String>) -> Self {
        CodecError::OutOfRange(message.into())
    }

    /// Create an error for a decode buffer of the wrong length.
    pub fn wrong_length(type_name: &str, expected: usize, actual: usize) -> Self {
        CodecError::OutOfRange(format!(
            "{type_name} needs {expected} bytes, got {actual}"
        ))
    }
}

/// Errors raised while serializing or deserializing a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Limiter byte does not name a known frame format.
    #[error("unrecognized limiter byte: 0x{0:02X}")]
    UnknownLimiter(u8),

    /// Frame ends before a mandatory field.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Length needed to read the next field.
        expected: usize,
        /// Length of the frame.
        actual: usize,
    },

    /// Counter byte disagrees with the bytes present.
    #[error("byte count mismatch: counter declares {declared}, frame holds {actual}")]
    ByteCountMismatch {
        /// Value of the counter byte.
        declared: usize,
        /// Bytes between counter and checksum.
        actual: usize,
    },

    /// Trailing checksum does not match the frame content.
    #[error("checksum mismatch: frame carries 0x{expected:02X}, computed 0x{actual:02X}")]
    ChecksumMismatch {
        /// Checksum byte carried by the frame.
        expected: u8,
        /// Checksum computed over the frame content.
        actual: u8,
    },

    /// Payload does not fit the one-byte counter.
    #[error("payload too long: {len} bytes (max {max})")]
    PayloadTooLong {
        /// Payload length.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// Command number beyond the two-byte command range.
    #[error("command {0} outside the extended command range")]
    CommandOutOfRange(u16),

    /// Address length does not fit the frame format.
    #[error("address of {actual} bytes does not fit a {format:?} frame ({expected} bytes)")]
    AddressLength {
        /// Frame format of the message.
        format: FrameFormat,
        /// Address length required by the format.
        expected: usize,
        /// Address length supplied.
        actual: usize,
    },
}

impl FrameError {
    /// Whether the frame failed its checksum.
    pub fn is_integrity(&self) -> bool {
        matches!(self, FrameError::ChecksumMismatch { .. })
    }

    /// Whether the frame structure itself was invalid.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            FrameError::UnknownLimiter(_)
                | FrameError::TooShort { .. }
                | FrameError::ByteCountMismatch { .. }
        )
    }
}

/// Errors raised by a transport connector.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Operation requires an open connection.
    #[error("transport not connected")]
    NotConnected,

    /// Connector settings the transport cannot apply.
    #[error("invalid transport configuration: {0}")]
    Config(String),

    /// Underlying I/O failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Any error surfaced by the library.
#[derive(Error, Debug)]
pub enum HartError {
    /// Value codec failure.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Frame codec failure.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type alias for HART operations.
pub type HartResult<T> = Result<T, HartError>;
