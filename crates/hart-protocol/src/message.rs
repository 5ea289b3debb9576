//! Frame codec: requests out, responses in.
//!
//! [`Request::serialize`] lays a request out on the wire. [`Response::deserialize`]
//! validates a received frame's checksum before reading any other field, then
//! splits it into its parts. Payloads stay as raw bytes and are decoded on
//! demand through [`Message::data_as`] or [`Message::value`].

use bytes::BufMut;
use serde::Serialize;
use tracing::trace;

use crate::constants::*;
use crate::error::{CodecError, FrameError};
use crate::frame::{
    checksum, count_preamble, decode_command, encode_command, FrameFormat, FrameMode, Limiter,
};
use crate::response_code;
use crate::value::{self, HartValue, Value, ValueKind};

/// Fields shared by requests and responses.
pub trait Message {
    /// Number of preamble bytes.
    fn preamble(&self) -> usize;

    /// Address width of the frame.
    fn frame_format(&self) -> FrameFormat;

    /// Device address bytes.
    fn address(&self) -> &[u8];

    /// Command number.
    fn command(&self) -> u16;

    /// Raw payload bytes, response code excluded.
    fn data(&self) -> &[u8];

    /// Decode the whole payload as a typed value.
    fn data_as<T: HartValue>(&self) -> Result<T, CodecError>
    where
        Self: Sized,
    {
        value::decode_as(Some(self.data()))
    }

    /// Decode the whole payload as a value of `kind`.
    fn value(&self, kind: ValueKind) -> Result<Value, CodecError> {
        value::decode(kind, Some(self.data()))
    }
}

// ============================================================================
// Request
// ============================================================================

/// Master-to-device frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Request {
    preamble: usize,
    format: FrameFormat,
    mode: FrameMode,
    address: Vec<u8>,
    command: u16,
    data: Vec<u8>,
    include_data: bool,
}

impl Request {
    /// Request with no address and no payload.
    pub fn new(format: FrameFormat, command: u16) -> Self {
        Request {
            preamble: DEFAULT_PREAMBLE_LEN,
            format,
            mode: FrameMode::Acknowledge,
            address: Vec::new(),
            command,
            data: Vec::new(),
            include_data: true,
        }
    }

    /// Short-frame request to a polling address.
    pub fn short(address: u8, command: u16) -> Self {
        Request {
            address: vec![address],
            ..Request::new(FrameFormat::Short, command)
        }
    }

    /// Long-frame request to a unique address.
    pub fn long(address: [u8; LONG_ADDRESS_LEN], command: u16) -> Self {
        Request {
            address: address.to_vec(),
            ..Request::new(FrameFormat::Long, command)
        }
    }

    /// Set the preamble length.
    pub fn with_preamble(mut self, preamble: usize) -> Self {
        self.preamble = preamble;
        self
    }

    /// Set the transmission mode encoded in the limiter.
    pub fn with_mode(mut self, mode: FrameMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the address. Its length must match the frame format.
    pub fn with_address(mut self, address: impl Into<Vec<u8>>) -> Result<Self, FrameError> {
        let address = address.into();
        let expected = self.format.address_len();
        if address.len() != expected {
            return Err(FrameError::AddressLength {
                format: self.format,
                expected,
                actual: address.len(),
            });
        }
        self.address = address;
        Ok(self)
    }

    /// Replace the payload with raw bytes.
    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    /// Append an encoded value to the payload.
    pub fn with_value<T: HartValue>(mut self, value: T) -> Result<Self, CodecError> {
        self.add_data(value)?;
        Ok(self)
    }

    /// Keep the payload on the request but leave it out of the serialized frame.
    pub fn without_data_in_frame(mut self) -> Self {
        self.include_data = false;
        self
    }

    /// Append an encoded value to the payload.
    pub fn add_data<T: HartValue>(&mut self, value: T) -> Result<(), CodecError> {
        let bytes = value::encode_as(Some(value))?;
        self.data.extend_from_slice(&bytes);
        Ok(())
    }

    /// Change the preamble length.
    pub fn set_preamble(&mut self, preamble: usize) {
        self.preamble = preamble;
    }

    /// Change the command number.
    pub fn set_command(&mut self, command: u16) {
        self.command = command;
    }

    /// Transmission mode.
    pub fn mode(&self) -> FrameMode {
        self.mode
    }

    /// Whether the payload is written into the serialized frame.
    pub fn includes_data(&self) -> bool {
        self.include_data
    }

    /// Limiter this request serializes with.
    pub fn limiter(&self) -> Limiter {
        Limiter::new(self.format, self.mode)
    }

    /// Lay the request out as wire bytes.
    pub fn serialize(&self) -> Result<Vec<u8>, FrameError> {
        let payload: &[u8] = if self.include_data { &self.data } else { &[] };
        if payload.len() > MAX_BYTE_COUNT {
            return Err(FrameError::PayloadTooLong {
                len: payload.len(),
                max: MAX_BYTE_COUNT,
            });
        }

        let mut buf = Vec::with_capacity(self.preamble + self.address.len() + payload.len() + 6);
        buf.put_bytes(PREAMBLE_SYMBOL, self.preamble);

        let start = buf.len();
        buf.put_u8(self.limiter().to_byte());
        buf.put_slice(&self.address);
        encode_command(self.command, &mut buf)?;
        buf.put_u8(payload.len() as u8);
        buf.put_slice(payload);
        buf.put_u8(checksum(&buf[start..]));

        trace!(command = self.command, len = buf.len(), "serialized request");
        Ok(buf)
    }
}

impl Message for Request {
    fn preamble(&self) -> usize {
        self.preamble
    }

    fn frame_format(&self) -> FrameFormat {
        self.format
    }

    fn address(&self) -> &[u8] {
        &self.address
    }

    fn command(&self) -> u16 {
        self.command
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

// ============================================================================
// Response
// ============================================================================

/// Device-to-master frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    preamble: usize,
    limiter: Limiter,
    address: Vec<u8>,
    command: u16,
    response_code: u32,
    status: [u8; RESPONSE_CODE_LEN],
    communication_error: &'static str,
    data: Vec<u8>,
}

impl Response {
    /// Parse and validate a complete received frame, preamble included.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, FrameError> {
        let preamble = count_preamble(bytes);
        let min_len = preamble + MIN_RESPONSE_BODY_LEN;
        if bytes.len() < min_len {
            return Err(FrameError::TooShort {
                expected: min_len,
                actual: bytes.len(),
            });
        }

        // checksum first, nothing else is trusted before it matches
        let (&carried, content) = bytes[preamble..]
            .split_last()
            .ok_or(FrameError::TooShort {
                expected: min_len,
                actual: bytes.len(),
            })?;
        let computed = checksum(content);
        if computed != carried {
            return Err(FrameError::ChecksumMismatch {
                expected: carried,
                actual: computed,
            });
        }

        let mut reader = FieldReader::new(content, preamble, bytes.len());

        let [limiter] = reader.take_array::<1>()?;
        let limiter = Limiter::from_byte(limiter)?;
        let address = reader.take(limiter.format().address_len())?.to_vec();

        let (command, width) = decode_command(reader.rest()).map_err(|_| reader.too_short(2))?;
        reader.skip(width);

        let [counter] = reader.take_array::<1>()?;
        let status = reader.take_array::<RESPONSE_CODE_LEN>()?;

        let data = reader.rest();
        let actual = RESPONSE_CODE_LEN + data.len();
        if usize::from(counter) != actual {
            return Err(FrameError::ByteCountMismatch {
                declared: usize::from(counter),
                actual,
            });
        }

        trace!(command, len = bytes.len(), "deserialized response");
        Ok(Response {
            preamble,
            limiter,
            address,
            command,
            response_code: u32::from(u16::from_le_bytes(status)),
            status,
            communication_error: response_code::describe(status[0]),
            data: data.to_vec(),
        })
    }

    /// Combined response code, both bytes little-endian.
    pub fn response_code(&self) -> u32 {
        self.response_code
    }

    /// First response-code byte.
    pub fn communication_status(&self) -> u8 {
        self.status[0]
    }

    /// Second response-code byte.
    pub fn device_status(&self) -> u8 {
        self.status[1]
    }

    /// Description of the first response-code byte.
    pub fn communication_error(&self) -> &'static str {
        self.communication_error
    }

    /// Whether the device reported a communication failure instead of a command result.
    pub fn is_communication_error(&self) -> bool {
        response_code::is_communication_error(self.status[0])
    }

    /// Whether the device sent this frame in batch (burst) mode.
    pub fn is_batch_mode(&self) -> bool {
        self.limiter.is_batch_mode()
    }

    /// Limiter the frame arrived with.
    pub fn limiter(&self) -> Limiter {
        self.limiter
    }
}

impl Message for Response {
    fn preamble(&self) -> usize {
        self.preamble
    }

    fn frame_format(&self) -> FrameFormat {
        self.limiter.format()
    }

    fn address(&self) -> &[u8] {
        &self.address
    }

    fn command(&self) -> u16 {
        self.command
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Sequential reads over the checksummed part of a frame.
struct FieldReader<'a> {
    content: &'a [u8],
    pos: usize,
    preamble: usize,
    frame_len: usize,
}

impl<'a> FieldReader<'a> {
    fn new(content: &'a [u8], preamble: usize, frame_len: usize) -> Self {
        FieldReader {
            content,
            pos: 0,
            preamble,
            frame_len,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], FrameError> {
        let field = self
            .content
            .get(self.pos..self.pos + len)
            .ok_or_else(|| self.too_short(len))?;
        self.pos += len;
        Ok(field)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], FrameError> {
        let field = self.take(N)?;
        field.try_into().map_err(|_| self.too_short(N))
    }

    fn skip(&mut self, len: usize) {
        self.pos = (self.pos + len).min(self.content.len());
    }

    fn rest(&self) -> &'a [u8] {
        &self.content[self.pos..]
    }

    fn too_short(&self, len: usize) -> FrameError {
        // preamble + fields read so far + wanted field + checksum
        FrameError::TooShort {
            expected: self.preamble + self.pos + len + 1,
            actual: self.frame_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: [u8; 26] = [
        0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x06, 0x80, 0x00, 0x0E, 0x00, 0x00, 0xFE, 0xFE,
        0x96, 0x08, 0x05, 0x4E, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x58,
    ];

    fn frame(preamble: usize, content: &[u8]) -> Vec<u8> {
        let mut bytes = vec![PREAMBLE_SYMBOL; preamble];
        bytes.extend_from_slice(content);
        bytes.push(checksum(content));
        bytes
    }

    #[test]
    fn test_deserialize_scenario() {
        let response = Response::deserialize(&RESPONSE).unwrap();
        assert_eq!(response.preamble(), 7);
        assert_eq!(response.frame_format(), FrameFormat::Short);
        assert!(!response.is_batch_mode());
        assert_eq!(response.address(), &[0x80]);
        assert_eq!(response.command(), 0);
        assert_eq!(response.response_code(), 0);
        assert_eq!(response.communication_error(), "No error");
        assert!(!response.is_communication_error());
        assert_eq!(response.data().len(), 12);
        assert_eq!(&response.data()[..4], &[0xFE, 0xFE, 0x96, 0x08]);
    }

    #[test]
    fn test_checksum_failure() {
        let mut bytes = RESPONSE;
        bytes[25] ^= 0x01;
        let err = Response::deserialize(&bytes).unwrap_err();
        assert!(err.is_integrity());
        assert_eq!(
            err,
            FrameError::ChecksumMismatch {
                expected: 0x59,
                actual: 0x58
            }
        );
    }

    #[test]
    fn test_checksum_checked_before_limiter() {
        // bad limiter and bad checksum: integrity wins
        let mut bytes = frame(2, &[0x03, 0x00, 0x00, 0x02, 0x00, 0x00]);
        *bytes.last_mut().unwrap() ^= 0xFF;
        assert!(Response::deserialize(&bytes).unwrap_err().is_integrity());

        let bytes = frame(2, &[0x03, 0x00, 0x00, 0x02, 0x00, 0x00]);
        assert_eq!(
            Response::deserialize(&bytes).unwrap_err(),
            FrameError::UnknownLimiter(0x03)
        );
    }

    #[test]
    fn test_too_short() {
        let err = Response::deserialize(&[0xFF, 0xFF, 0x06, 0x80]).unwrap_err();
        assert!(matches!(err, FrameError::TooShort { actual: 4, .. }));
        assert!(err.is_malformed());

        // long limiter leaves no room for a five byte address
        let bytes = frame(2, &[0x86, 0x01, 0x02, 0x03, 0x02, 0x00]);
        assert!(matches!(
            Response::deserialize(&bytes),
            Err(FrameError::TooShort { .. })
        ));
    }

    #[test]
    fn test_byte_count_mismatch() {
        let bytes = frame(5, &[0x06, 0x80, 0x00, 0x05, 0x00, 0x00, 0x01]);
        assert_eq!(
            Response::deserialize(&bytes).unwrap_err(),
            FrameError::ByteCountMismatch {
                declared: 5,
                actual: 3
            }
        );
    }

    #[test]
    fn test_long_frame_extended_command() {
        let bytes = frame(
            5,
            &[
                0x81, 0x26, 0x4E, 0x00, 0x00, 0x01, // limiter + address
                0xFE, 0x0A, // command 264
                0x04, 0x84, 0x40, 0x2A, 0x00, // counter, code, data
            ],
        );

        let response = Response::deserialize(&bytes).unwrap();
        assert_eq!(response.frame_format(), FrameFormat::Long);
        assert!(response.is_batch_mode());
        assert_eq!(response.address(), &[0x26, 0x4E, 0x00, 0x00, 0x01]);
        assert_eq!(response.command(), 264);
        assert_eq!(response.communication_status(), 0x84);
        assert_eq!(response.device_status(), 0x40);
        assert_eq!(response.response_code(), 0x4084);
        assert!(response.is_communication_error());
        assert_eq!(response.data_as::<u16>().unwrap(), 42);
    }

    #[test]
    fn test_lenient_preamble() {
        let bytes = frame(0, &[0x06, 0x01, 0x03, 0x02, 0x07, 0x00]);
        let response = Response::deserialize(&bytes).unwrap();
        assert_eq!(response.preamble(), 0);
        assert_eq!(response.communication_error(), "In write-protect mode");
        assert!(response.data().is_empty());
    }

    #[test]
    fn test_response_value_access() {
        let bytes = frame(5, &[0x06, 0x00, 0x01, 0x06, 0x00, 0x00, 0x00, 0x00, 0x80, 0x3F]);
        let response = Response::deserialize(&bytes).unwrap();
        assert_eq!(response.value(ValueKind::Float32).unwrap(), Value::Float32(1.0));
        assert!(response.data_as::<u16>().is_err());
    }

    #[test]
    fn test_serialize_scenario() {
        let request = Request::new(FrameFormat::Short, 0).with_preamble(3);
        assert_eq!(
            request.serialize().unwrap(),
            [0xFF, 0xFF, 0xFF, 0x02, 0x00, 0x00, 0x02]
        );
    }

    #[test]
    fn test_serialize_without_data() {
        let request = Request::short(0, 0)
            .with_preamble(3)
            .with_value("Hello world".to_string())
            .unwrap()
            .without_data_in_frame();

        assert_eq!(request.data(), b"Hello world");
        assert!(!request.includes_data());
        assert_eq!(
            request.serialize().unwrap(),
            [0xFF, 0xFF, 0xFF, 0x02, 0x00, 0x00, 0x00, 0x02]
        );
    }

    #[test]
    fn test_serialize_with_data() {
        let mut request = Request::short(3, 6);
        request.add_data(500u16).unwrap();
        request.set_preamble(2);

        let bytes = request.serialize().unwrap();
        assert_eq!(bytes, [0xFF, 0xFF, 0x02, 0x03, 0x06, 0x02, 0xF4, 0x01, 0xF0]);
        assert_eq!(checksum(&bytes[2..bytes.len() - 1]), *bytes.last().unwrap());
    }

    #[test]
    fn test_serialize_long_extended() {
        let request = Request::long([0x26, 0x4E, 0x00, 0x00, 0x01], 300)
            .with_mode(FrameMode::Batch)
            .with_preamble(2);

        let bytes = request.serialize().unwrap();
        assert_eq!(
            &bytes[..bytes.len() - 1],
            &[0xFF, 0xFF, 0x81, 0x26, 0x4E, 0x00, 0x00, 0x01, 0xFE, 0x2E, 0x00]
        );
    }

    #[test]
    fn test_serialize_errors() {
        let request = Request::short(0, 0).with_data(vec![0u8; 256]);
        assert_eq!(
            request.serialize().unwrap_err(),
            FrameError::PayloadTooLong { len: 256, max: 255 }
        );

        let request = Request::short(0, 600);
        assert_eq!(
            request.serialize().unwrap_err(),
            FrameError::CommandOutOfRange(600)
        );
    }

    #[test]
    fn test_with_address_validates_length() {
        let err = Request::new(FrameFormat::Long, 0)
            .with_address(vec![1u8, 2])
            .unwrap_err();
        assert_eq!(
            err,
            FrameError::AddressLength {
                format: FrameFormat::Long,
                expected: 5,
                actual: 2
            }
        );

        let request = Request::new(FrameFormat::Short, 0).with_address([7]).unwrap();
        assert_eq!(request.address(), &[7]);
    }

    #[test]
    fn test_request_response_exchange() {
        // a device echoing the request's address and command
        let request = Request::short(1, 13).with_preamble(5);
        let sent = request.serialize().unwrap();
        let mut content = vec![0x06];
        content.extend_from_slice(&sent[6..7]);
        content.extend_from_slice(&[0x0D, 0x02, 0x00, 0x00]);

        let response = Response::deserialize(&frame(5, &content)).unwrap();
        assert_eq!(response.address(), request.address());
        assert_eq!(response.command(), request.command());
    }
}
