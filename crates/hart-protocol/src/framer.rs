//! Byte-stream framer.
//!
//! Recovers frame boundaries from a continuous byte stream. HART has no frame
//! delimiter besides the preamble/limiter pair, so the framer walks every
//! frame field by field, one byte per transition:
//!
//! ```text
//! SeekPreamble -> CountPreamble -> Address -> Command [-> ExtendedCommand]
//!              -> Counter -> Data -> Checksum -> (frame) -> SeekPreamble
//! ```
//!
//! Bytes may arrive in any chunking; the state survives between calls.
//! Noise before a frame and preamble runs not followed by a device limiter
//! are discarded and the framer resynchronizes on the next preamble byte.
//! Checksums are not verified here, that is left to the message codec.
//! At most [`MAX_KEPT_PREAMBLE_LEN`] preamble bytes are kept per frame, so a
//! line stuck at `0xFF` cannot grow the buffer.

use std::collections::vec_deque::{self, VecDeque};

use bytes::{BufMut, BytesMut};
use tracing::trace;

use crate::constants::{
    EXTENDED_COMMAND_MARKER, MAX_KEPT_PREAMBLE_LEN, MIN_PREAMBLE_LEN, PREAMBLE_SYMBOL,
};
use crate::frame::{Limiter, RawFrame};

/// Upper bound of a frame: preamble run aside, every field fits in 1 + 5 + 2 + 1 + 255 + 1.
const FRAME_CAPACITY: usize = 280;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    SeekPreamble,
    CountPreamble { count: usize },
    Address { remaining: usize },
    Command,
    ExtendedCommand,
    Counter,
    Data { remaining: usize },
    Checksum,
}

/// Incremental frame recognizer.
#[derive(Debug)]
pub struct Framer {
    buffer: BytesMut,
    state: State,
    ready: VecDeque<RawFrame>,
    discarded: u64,
}

impl Framer {
    /// Create an idle framer.
    pub fn new() -> Self {
        Framer {
            buffer: BytesMut::with_capacity(FRAME_CAPACITY),
            state: State::SeekPreamble,
            ready: VecDeque::new(),
            discarded: 0,
        }
    }

    /// Advance by one byte. Returns the frame this byte completed, if any.
    pub fn push_byte(&mut self, byte: u8) -> Option<RawFrame> {
        match self.state {
            State::SeekPreamble => {
                if byte == PREAMBLE_SYMBOL {
                    self.buffer.put_u8(byte);
                    self.state = State::CountPreamble { count: 1 };
                } else {
                    self.discarded += 1;
                }
                None
            }

            State::CountPreamble { count } => {
                if byte == PREAMBLE_SYMBOL {
                    if count < MAX_KEPT_PREAMBLE_LEN {
                        self.buffer.put_u8(byte);
                    } else {
                        self.discarded += 1;
                    }
                    self.state = State::CountPreamble {
                        count: count.saturating_add(1),
                    };
                    return None;
                }

                if count >= MIN_PREAMBLE_LEN && Limiter::is_device_limiter(byte) {
                    let address_len = Limiter::from_byte(byte)
                        .map(|limiter| limiter.format().address_len())
                        .unwrap_or_default();
                    self.buffer.put_u8(byte);
                    self.state = State::Address {
                        remaining: address_len,
                    };
                } else {
                    trace!(
                        preamble = count,
                        byte = format_args!("0x{byte:02X}"),
                        "no limiter after preamble, resyncing"
                    );
                    self.discarded += self.buffer.len() as u64 + 1;
                    self.restart();
                }
                None
            }

            State::Address { remaining } => {
                self.buffer.put_u8(byte);
                self.state = if remaining > 1 {
                    State::Address {
                        remaining: remaining - 1,
                    }
                } else {
                    State::Command
                };
                None
            }

            State::Command => {
                self.buffer.put_u8(byte);
                self.state = if byte == EXTENDED_COMMAND_MARKER {
                    State::ExtendedCommand
                } else {
                    State::Counter
                };
                None
            }

            State::ExtendedCommand => {
                self.buffer.put_u8(byte);
                self.state = State::Counter;
                None
            }

            State::Counter => {
                self.buffer.put_u8(byte);
                self.state = match byte {
                    0 => State::Checksum,
                    n => State::Data {
                        remaining: n as usize,
                    },
                };
                None
            }

            State::Data { remaining } => {
                self.buffer.put_u8(byte);
                self.state = if remaining > 1 {
                    State::Data {
                        remaining: remaining - 1,
                    }
                } else {
                    State::Checksum
                };
                None
            }

            State::Checksum => {
                self.buffer.put_u8(byte);
                let frame = RawFrame::new(self.buffer.split().freeze());
                self.state = State::SeekPreamble;
                trace!(len = frame.len(), "frame complete");
                Some(frame)
            }
        }
    }

    /// Feed a chunk of received bytes.
    ///
    /// Completed frames are queued for [`Framer::decode`]. Returns how many
    /// frames this chunk completed.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let mut completed = 0;
        for &byte in data {
            if let Some(frame) = self.push_byte(byte) {
                self.ready.push_back(frame);
                completed += 1;
            }
        }
        completed
    }

    /// Take the oldest completed frame.
    pub fn decode(&mut self) -> Option<RawFrame> {
        self.ready.pop_front()
    }

    /// Take all completed frames in arrival order.
    pub fn drain(&mut self) -> vec_deque::Drain<'_, RawFrame> {
        self.ready.drain(..)
    }

    /// Abandon the frame in progress. Completed frames stay queued.
    pub fn reset(&mut self) {
        if !self.buffer.is_empty() {
            trace!(pending = self.buffer.len(), "discarding partial frame");
            self.discarded += self.buffer.len() as u64;
        }
        self.restart();
    }

    /// Whether no frame is in progress.
    pub fn is_idle(&self) -> bool {
        self.state == State::SeekPreamble
    }

    /// Bytes accumulated for the frame in progress.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Completed frames waiting to be taken.
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Total bytes discarded as noise or abandoned partial frames.
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded
    }

    fn restart(&mut self) {
        self.buffer.clear();
        self.state = State::SeekPreamble;
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: [u8; 26] = [
        0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // preamble
        0x06, // limiter
        0x80, // address
        0x00, // command
        0x0E, // counter
        0x00, 0x00, // response code
        0xFE, 0xFE, 0x96, 0x08, 0x05, 0x4E, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, // data
        0x58, // checksum
    ];

    #[test]
    fn test_single_frame() {
        let mut framer = Framer::new();
        assert_eq!(framer.push(&RESPONSE), 1);
        assert_eq!(framer.decode().unwrap().as_bytes(), &RESPONSE);
        assert!(framer.decode().is_none());
        assert!(framer.is_idle());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut framer = Framer::new();
        let (last, head) = RESPONSE.split_last().unwrap();

        for &byte in head {
            assert!(framer.push_byte(byte).is_none());
        }
        assert_eq!(framer.pending_len(), head.len());

        let frame = framer.push_byte(*last).expect("frame should complete");
        assert_eq!(frame.as_bytes(), &RESPONSE);
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn test_leading_noise_discarded() {
        let mut framer = Framer::new();
        framer.push(&[0x00, 0x13, 0x06, 0x80]);
        assert!(framer.is_idle());
        assert_eq!(framer.discarded_bytes(), 4);

        assert_eq!(framer.push(&RESPONSE), 1);
        assert_eq!(framer.decode().unwrap().as_bytes(), &RESPONSE);
    }

    #[test]
    fn test_single_preamble_rejected() {
        let mut framer = Framer::new();

        // one preamble byte is not enough, even before a valid limiter
        framer.push(&[0xFF, 0x06, 0x80, 0x00, 0x02, 0x00, 0x00]);
        assert_eq!(framer.ready_len(), 0);
        assert!(framer.is_idle());
    }

    #[test]
    fn test_acknowledge_limiter_rejected() {
        let mut framer = Framer::new();
        framer.push(&[0xFF, 0xFF, 0x02, 0x80, 0x00, 0x00, 0x02]);
        assert_eq!(framer.ready_len(), 0);
    }

    #[test]
    fn test_long_address_and_extended_command() {
        let body = [
            0x86, 0x26, 0x4E, 0x00, 0x00, 0x01, // limiter + long address
            0xFE, 0x10, // extended command
            0x03, 0x00, 0x00, 0x2A, // counter, code, data
        ];
        let mut frame = vec![0xFF, 0xFF, 0xFF];
        frame.extend_from_slice(&body);
        frame.push(crate::frame::checksum(&body));

        let mut framer = Framer::new();
        assert_eq!(framer.push(&frame), 1);
        assert_eq!(framer.decode().unwrap().as_bytes(), &frame[..]);
    }

    #[test]
    fn test_empty_data() {
        // counter of zero goes straight to the checksum
        let frame = [0xFF, 0xFF, 0x01, 0x05, 0x03, 0x00, 0x07];
        let mut framer = Framer::new();
        assert_eq!(framer.push(&frame), 1);
        assert_eq!(framer.decode().unwrap().as_bytes(), &frame);
    }

    #[test]
    fn test_reset_abandons_partial_frame() {
        let mut framer = Framer::new();
        framer.push(&RESPONSE[..12]);
        assert!(!framer.is_idle());

        framer.reset();
        assert!(framer.is_idle());
        assert_eq!(framer.pending_len(), 0);
        assert_eq!(framer.discarded_bytes(), 12);

        assert_eq!(framer.push(&RESPONSE), 1);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut stream = Vec::new();
        for _ in 0..3 {
            stream.extend_from_slice(&RESPONSE);
        }

        let mut framer = Framer::new();
        assert_eq!(framer.push(&stream), 3);
        let frames: Vec<RawFrame> = framer.drain().collect();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.as_bytes() == RESPONSE));
    }

    #[test]
    fn test_long_preamble_run_is_capped() {
        let mut framer = Framer::new();
        framer.push(&[PREAMBLE_SYMBOL; 10_000]);
        assert_eq!(framer.pending_len(), MAX_KEPT_PREAMBLE_LEN);
        assert_eq!(framer.discarded_bytes(), 10_000 - MAX_KEPT_PREAMBLE_LEN as u64);

        assert_eq!(framer.push(&RESPONSE[7..]), 1);
        let frame = framer.decode().unwrap();
        assert_eq!(frame.len(), MAX_KEPT_PREAMBLE_LEN + RESPONSE.len() - 7);
        assert_eq!(&frame.as_bytes()[MAX_KEPT_PREAMBLE_LEN..], &RESPONSE[7..]);
    }
}
