//! Protocol constants
//!
//! Byte values, field widths and limits of the HART frame layout and of the
//! primitive payload encodings.

// ============================================================================
// Preamble
// ============================================================================

/// Synchronization byte repeated at the start of every frame.
pub const PREAMBLE_SYMBOL: u8 = 0xFF;
/// Minimum number of preamble bytes before a limiter is accepted.
pub const MIN_PREAMBLE_LEN: usize = 2;
/// Preamble length used for requests unless configured otherwise.
pub const DEFAULT_PREAMBLE_LEN: usize = 5;
/// Preamble bytes the framer keeps in a frame. Longer runs are counted but dropped.
pub const MAX_KEPT_PREAMBLE_LEN: usize = 20;

// ============================================================================
// Limiter
// ============================================================================

/// Limiter bit selecting the long (5-byte address) frame format.
pub const LIMITER_LONG_FRAME: u8 = 0x80;
/// Limiter low bits for a batch (burst) mode frame.
pub const LIMITER_BATCH: u8 = 0x01;
/// Limiter low bits for an acknowledge frame (master requests).
pub const LIMITER_ACKNOWLEDGE: u8 = 0x02;
/// Limiter low bits for an on-demand frame.
pub const LIMITER_ON_DEMAND: u8 = 0x06;

// ============================================================================
// Field widths
// ============================================================================

/// Address width of a short frame.
pub const SHORT_ADDRESS_LEN: usize = 1;
/// Address width of a long frame.
pub const LONG_ADDRESS_LEN: usize = 5;
/// Command byte announcing a second command byte.
pub const EXTENDED_COMMAND_MARKER: u8 = 254;
/// Largest command number the two-byte form can carry.
pub const MAX_EXTENDED_COMMAND: u16 = EXTENDED_COMMAND_MARKER as u16 + u8::MAX as u16;
/// Width of the response code carried by every response.
pub const RESPONSE_CODE_LEN: usize = 2;
/// Largest value of the one-byte counter field.
pub const MAX_BYTE_COUNT: usize = u8::MAX as usize;

/// Smallest response body after the preamble:
/// limiter + short address + command + counter + response code + checksum.
pub const MIN_RESPONSE_BODY_LEN: usize = 1 + SHORT_ADDRESS_LEN + 1 + 1 + RESPONSE_CODE_LEN + 1;

// ============================================================================
// Primitive value encodings
// ============================================================================

/// Largest unsigned integer representable in the 3-byte encoding.
pub const UINT24_MAX: u32 = 16_777_215;
/// Encoded width of the 3-byte unsigned integer.
pub const UINT24_LEN: usize = 3;
/// Encoded width of a date (day, month, year offset).
pub const DATE_LEN: usize = 3;
/// Year that a stored year offset of zero refers to.
pub const DATE_YEAR_BASE: i32 = 1900;
/// Maximum number of flags packed into one byte.
pub const MAX_FLAGS: usize = 8;
