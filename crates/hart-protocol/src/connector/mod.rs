//! Transport connectors.
//!
//! A connector moves bytes to and from a device and recognizes frame
//! boundaries on the receive path. Every connector embeds a
//! [`FrameReceiver`], which runs the [`Framer`] on whatever thread delivers
//! the bytes and raises the frame listener once per completed frame.

mod link;
mod memory;
mod serial;
mod tcp;

pub use memory::MemoryConnector;
pub use serial::{
    is_port_accessible, Parity, SerialConnector, SerialConnectorConfig, DEFAULT_BAUD_RATE,
};
pub use tcp::{TcpConnector, TcpConnectorConfig};

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::error::TransportError;
use crate::frame::RawFrame;
use crate::framer::Framer;

/// Callback raised when a complete frame is ready to [`Connector::receive`].
pub type FrameListener = Arc<dyn Fn() + Send + Sync>;

/// Byte transport to a device.
pub trait Connector: Send + Sync + 'static {
    /// Open the transport.
    fn connect(&self) -> Result<(), TransportError>;

    /// Close the transport. Closing a closed transport is a no-op.
    fn disconnect(&self);

    /// Whether the transport is open.
    fn is_connected(&self) -> bool;

    /// Write bytes to the device.
    fn send(&self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Take the oldest received frame.
    fn receive(&self) -> Option<RawFrame>;

    /// Install the frame-ready callback, replacing any previous one.
    fn set_frame_listener(&self, listener: FrameListener);
}

/// Receive path shared by connectors: framer plus frame-ready notification.
#[derive(Default)]
pub struct FrameReceiver {
    framer: Mutex<Framer>,
    listener: RwLock<Option<FrameListener>>,
}

impl FrameReceiver {
    /// Create a receiver with an idle framer and no listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed received bytes. Returns the number of frames they completed.
    ///
    /// The listener runs once per completed frame, after the framer lock is
    /// released, so it may call [`FrameReceiver::receive`].
    pub fn deliver(&self, chunk: &[u8]) -> usize {
        let completed = self.framer.lock().push(chunk);
        if completed == 0 {
            return 0;
        }

        trace!(completed, "frames ready");
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            for _ in 0..completed {
                listener();
            }
        }
        completed
    }

    /// Take the oldest completed frame.
    pub fn receive(&self) -> Option<RawFrame> {
        self.framer.lock().decode()
    }

    /// Abandon a partially received frame. Returns whether one was pending.
    pub fn reset_partial(&self) -> bool {
        let mut framer = self.framer.lock();
        if framer.is_idle() {
            return false;
        }
        framer.reset();
        true
    }

    /// Install the frame-ready callback.
    pub fn set_listener(&self, listener: FrameListener) {
        *self.listener.write() = Some(listener);
    }

    /// Total bytes the framer has discarded.
    pub fn discarded_bytes(&self) -> u64 {
        self.framer.lock().discarded_bytes()
    }
}
