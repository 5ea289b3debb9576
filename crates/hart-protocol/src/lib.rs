//! HART Master Protocol
//!
//! This crate implements the master side of the HART field-device protocol:
//! recognizing frames in a continuous byte stream, serializing requests,
//! validating and parsing responses, and decoding payload values.
//!
//! # Protocol Overview
//!
//! Every frame has the same layout:
//!
//! - **Preamble**: two or more `0xFF` bytes
//! - **Limiter**: frame format (short or long address) and mode
//! - **Address**: 1 byte (short) or 5 bytes (long)
//! - **Command**: 1 byte, or 2 bytes when the first is 254
//! - **Counter**: number of bytes up to the checksum
//! - **Payload**: response code (responses only) followed by data
//! - **Checksum**: XOR of limiter through payload
//!
//! # Example
//!
//! ```rust,ignore
//! use hart_protocol::{MemoryConnector, Message, ProtocolSession, Request};
//!
//! let session = ProtocolSession::new(MemoryConnector::new());
//! session.connect()?;
//! session.send(&Request::short(0, 0))?;
//!
//! if let Some(response) = session.dequeue() {
//!     println!("code {} data {:?}", response.response_code(), response.data());
//! }
//! ```

mod constants;
mod error;
mod frame;
mod framer;
mod message;
mod session;

pub mod connector;
pub mod response_code;
pub mod value;

pub use connector::{
    Connector, FrameListener, FrameReceiver, MemoryConnector, SerialConnector,
    SerialConnectorConfig, TcpConnector, TcpConnectorConfig,
};
pub use constants::*;
pub use error::*;
pub use frame::*;
pub use framer::*;
pub use message::*;
pub use session::*;
pub use value::{FlagSet, HartValue, Value, ValueKind};
