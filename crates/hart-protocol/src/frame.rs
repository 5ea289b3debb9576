//! Frame-level building blocks shared by the framer and the message codec.
//!
//! ```text
//! +-------------+---------+-----------+-----------+---------+--------------+----------+
//! | FF x P      | limiter | address   | command   | counter | payload ...  | checksum |
//! | preamble    | 1       | 1 or 5    | 1 or 2    | 1       | counter      | 1        |
//! +-------------+---------+-----------+-----------+---------+--------------+----------+
//! ```
//!
//! Response payloads start with the two response-code bytes. The checksum is
//! the XOR of every byte from the limiter through the last payload byte.

use std::fmt;
use std::ops::Deref;

use bytes::{BufMut, Bytes};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::FrameError;

// ============================================================================
// Frame Format and Mode
// ============================================================================

/// Address width of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    /// One-byte polling address.
    #[default]
    Short,
    /// Five-byte unique address.
    Long,
}

impl FrameFormat {
    /// Number of address bytes in this format.
    pub const fn address_len(self) -> usize {
        match self {
            FrameFormat::Short => SHORT_ADDRESS_LEN,
            FrameFormat::Long => LONG_ADDRESS_LEN,
        }
    }

    /// Whether this is the long format.
    pub fn is_long(self) -> bool {
        self == FrameFormat::Long
    }
}

/// Transmission mode carried in the limiter's low bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameMode {
    /// Device streams responses without being polled.
    Batch,
    /// Master request / acknowledge frame.
    #[default]
    Acknowledge,
    /// Device answers a poll.
    OnDemand,
}

impl FrameMode {
    const fn bits(self) -> u8 {
        match self {
            FrameMode::Batch => LIMITER_BATCH,
            FrameMode::Acknowledge => LIMITER_ACKNOWLEDGE,
            FrameMode::OnDemand => LIMITER_ON_DEMAND,
        }
    }
}

// ============================================================================
// Limiter
// ============================================================================

/// The byte closing the preamble, encoding frame format and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Limiter {
    format: FrameFormat,
    mode: FrameMode,
}

impl Limiter {
    /// Create a limiter from its parts.
    pub const fn new(format: FrameFormat, mode: FrameMode) -> Self {
        Limiter { format, mode }
    }

    /// Parse a limiter byte.
    pub fn from_byte(byte: u8) -> Result<Self, FrameError> {
        let format = if byte & LIMITER_LONG_FRAME != 0 {
            FrameFormat::Long
        } else {
            FrameFormat::Short
        };

        let mode = match byte & !LIMITER_LONG_FRAME {
            LIMITER_BATCH => FrameMode::Batch,
            LIMITER_ACKNOWLEDGE => FrameMode::Acknowledge,
            LIMITER_ON_DEMAND => FrameMode::OnDemand,
            _ => return Err(FrameError::UnknownLimiter(byte)),
        };

        Ok(Limiter { format, mode })
    }

    /// Whether `byte` may open a frame arriving from a device.
    ///
    /// Acknowledge limiters are masters' own frames and never start a
    /// received frame.
    pub fn is_device_limiter(byte: u8) -> bool {
        matches!(
            Limiter::from_byte(byte),
            Ok(Limiter {
                mode: FrameMode::Batch | FrameMode::OnDemand,
                ..
            })
        )
    }

    /// Encode to the wire byte.
    pub const fn to_byte(self) -> u8 {
        match self.format {
            FrameFormat::Short => self.mode.bits(),
            FrameFormat::Long => self.mode.bits() | LIMITER_LONG_FRAME,
        }
    }

    /// Frame format.
    pub fn format(self) -> FrameFormat {
        self.format
    }

    /// Transmission mode.
    pub fn mode(self) -> FrameMode {
        self.mode
    }

    /// Whether the frame was sent in batch (burst) mode.
    pub fn is_batch_mode(self) -> bool {
        self.mode == FrameMode::Batch
    }
}

impl TryFrom<u8> for Limiter {
    type Error = FrameError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Limiter::from_byte(byte)
    }
}

impl From<Limiter> for u8 {
    fn from(limiter: Limiter) -> Self {
        limiter.to_byte()
    }
}

// ============================================================================
// Raw Frame
// ============================================================================

/// A complete frame exactly as it appeared on the wire, preamble included.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawFrame(Bytes);

impl RawFrame {
    /// Wrap bytes as a raw frame.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        RawFrame(bytes.into())
    }

    /// Frame bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the underlying buffer.
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for RawFrame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for RawFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for RawFrame {
    fn from(bytes: Vec<u8>) -> Self {
        RawFrame(bytes.into())
    }
}

impl From<Bytes> for RawFrame {
    fn from(bytes: Bytes) -> Self {
        RawFrame(bytes)
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Field Helpers
// ============================================================================

/// XOR of all bytes.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Length of the leading preamble run.
pub fn count_preamble(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|&&b| b == PREAMBLE_SYMBOL).count()
}

/// Write a command number, using the two-byte form from 254 upwards.
pub fn encode_command<B: BufMut>(command: u16, buf: &mut B) -> Result<(), FrameError> {
    match command {
        0..=253 => buf.put_u8(command as u8),
        254..=MAX_EXTENDED_COMMAND => {
            buf.put_u8(EXTENDED_COMMAND_MARKER);
            buf.put_u8((command - u16::from(EXTENDED_COMMAND_MARKER)) as u8);
        }
        _ => return Err(FrameError::CommandOutOfRange(command)),
    }
    Ok(())
}

/// Read a command number from the start of `bytes`.
///
/// Returns the command and the number of bytes it occupied.
pub fn decode_command(bytes: &[u8]) -> Result<(u16, usize), FrameError> {
    match bytes {
        [EXTENDED_COMMAND_MARKER, ext, ..] => {
            Ok((u16::from(EXTENDED_COMMAND_MARKER) + u16::from(*ext), 2))
        }
        [EXTENDED_COMMAND_MARKER] => Err(FrameError::TooShort {
            expected: 2,
            actual: 1,
        }),
        [command, ..] => Ok((u16::from(*command), 1)),
        [] => Err(FrameError::TooShort {
            expected: 1,
            actual: 0,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limiter_parse() {
        let cases = [
            (0x01, FrameFormat::Short, FrameMode::Batch),
            (0x02, FrameFormat::Short, FrameMode::Acknowledge),
            (0x06, FrameFormat::Short, FrameMode::OnDemand),
            (0x81, FrameFormat::Long, FrameMode::Batch),
            (0x82, FrameFormat::Long, FrameMode::Acknowledge),
            (0x86, FrameFormat::Long, FrameMode::OnDemand),
        ];

        for (byte, format, mode) in cases {
            let limiter = Limiter::from_byte(byte).unwrap();
            assert_eq!(limiter.format(), format);
            assert_eq!(limiter.mode(), mode);
            assert_eq!(limiter.to_byte(), byte);
            assert_eq!(limiter.is_batch_mode(), mode == FrameMode::Batch);
        }

        for byte in [0x00, 0x03, 0x07, 0x80, 0xFF, 0x41] {
            assert_eq!(Limiter::from_byte(byte), Err(FrameError::UnknownLimiter(byte)));
        }
    }

    #[test]
    fn test_device_limiters() {
        let accepted: Vec<u8> = (0..=u8::MAX)
            .filter(|&b| Limiter::is_device_limiter(b))
            .collect();
        assert_eq!(accepted, [0x01, 0x06, 0x81, 0x86]);
    }

    #[test]
    fn test_checksum() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0x02, 0x00, 0x00]), 0x02);
        assert_eq!(checksum(&[0x06, 0x80, 0x00, 0x0E]), 0x88);
    }

    #[test]
    fn test_count_preamble() {
        assert_eq!(count_preamble(&[0xFF, 0xFF, 0x06, 0xFF]), 2);
        assert_eq!(count_preamble(&[0x06, 0xFF]), 0);
        assert_eq!(count_preamble(&[0xFF; 4]), 4);
    }

    #[test]
    fn test_command_encoding() {
        let mut buf = Vec::new();
        encode_command(0, &mut buf).unwrap();
        encode_command(253, &mut buf).unwrap();
        encode_command(254, &mut buf).unwrap();
        encode_command(300, &mut buf).unwrap();
        encode_command(MAX_EXTENDED_COMMAND, &mut buf).unwrap();
        assert_eq!(buf, [0, 253, 254, 0, 254, 46, 254, 255]);

        assert_eq!(
            encode_command(MAX_EXTENDED_COMMAND + 1, &mut buf),
            Err(FrameError::CommandOutOfRange(MAX_EXTENDED_COMMAND + 1))
        );
    }

    #[test]
    fn test_command_decoding() {
        assert_eq!(decode_command(&[0x00, 0x0E]).unwrap(), (0, 1));
        assert_eq!(decode_command(&[0xFF]).unwrap(), (255, 1));
        assert_eq!(decode_command(&[254, 46, 0x00]).unwrap(), (300, 2));
        assert!(matches!(decode_command(&[254]), Err(FrameError::TooShort { .. })));
        assert!(matches!(decode_command(&[]), Err(FrameError::TooShort { .. })));
    }

    #[test]
    fn test_raw_frame_display() {
        let frame = RawFrame::from(vec![0xFF, 0x06, 0x0a]);
        assert_eq!(frame.to_string(), "FF 06 0A");
        assert_eq!(frame.len(), 3);
        assert_eq!(&frame[..], &[0xFF, 0x06, 0x0A]);
    }
}
