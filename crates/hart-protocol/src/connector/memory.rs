//! In-process connector.
//!
//! Incoming bytes are injected by the caller and framed on the injecting
//! thread. Outgoing bytes are recorded for inspection.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use super::{Connector, FrameListener, FrameReceiver};
use crate::error::TransportError;
use crate::frame::RawFrame;

/// Connector backed by memory, for tests and simulations.
#[derive(Default)]
pub struct MemoryConnector {
    connected: AtomicBool,
    receiver: FrameReceiver,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MemoryConnector {
    /// Create a disconnected connector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver bytes as if a device had sent them.
    ///
    /// Bytes injected while disconnected are dropped. Returns the number of
    /// frames the bytes completed.
    pub fn inject(&self, bytes: &[u8]) -> usize {
        if !self.is_connected() {
            debug!(len = bytes.len(), "dropping bytes injected while disconnected");
            return 0;
        }
        self.receiver.deliver(bytes)
    }

    /// Every write made through [`Connector::send`], oldest first.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    /// Take and clear the recorded writes.
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl Connector for MemoryConnector {
    fn connect(&self) -> Result<(), TransportError> {
        if !self.connected.swap(true, Ordering::SeqCst) {
            debug!("memory connector connected");
        }
        Ok(())
    }

    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.receiver.reset_partial();
            debug!("memory connector disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.sent.lock().push(bytes.to_vec());
        Ok(())
    }

    fn receive(&self) -> Option<RawFrame> {
        self.receiver.receive()
    }

    fn set_frame_listener(&self, listener: FrameListener) {
        self.receiver.set_listener(listener);
    }
}
