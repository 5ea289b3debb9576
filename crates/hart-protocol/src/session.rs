//! Protocol session.
//!
//! Thin orchestration over a [`Connector`]: requests go out serialized,
//! received frames come back as [`Response`]s in a FIFO queue. Frames are
//! deserialized on the thread that delivered their last byte. There is no
//! retry or timeout logic at this level.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, warn};

use crate::connector::Connector;
use crate::error::{HartResult, TransportError};
use crate::frame::RawFrame;
use crate::message::{Message, Request, Response};

type MessageListener = Arc<dyn Fn(&Response) + Send + Sync>;

/// Counters kept by a [`ProtocolSession`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Frames deserialized and queued.
    pub frames_received: u64,
    /// Frames dropped because they failed to deserialize.
    pub frames_dropped: u64,
    /// Requests handed to the transport.
    pub requests_sent: u64,
}

/// State reachable from the connector's receive path.
#[derive(Default)]
struct Shared {
    queue: Mutex<VecDeque<Response>>,
    listeners: RwLock<Vec<MessageListener>>,
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    requests_sent: AtomicU64,
}

impl Shared {
    fn handle_frame(&self, frame: RawFrame) {
        let response = match Response::deserialize(&frame) {
            Ok(response) => response,
            Err(e) => {
                self.frames_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, %frame, "dropping invalid frame");
                return;
            }
        };

        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.queue.lock().push_back(response.clone());

        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            listener(&response);
        }
    }
}

/// Request/response session over a connector.
pub struct ProtocolSession<C: Connector> {
    connector: Arc<C>,
    shared: Arc<Shared>,
}

impl<C: Connector> ProtocolSession<C> {
    /// Create a session owning `connector`.
    pub fn new(connector: C) -> Self {
        Self::from_arc(Arc::new(connector))
    }

    /// Create a session over a shared connector.
    ///
    /// The session installs itself as the connector's frame listener and
    /// queues any frames the connector completed before that.
    pub fn from_arc(connector: Arc<C>) -> Self {
        let shared = Arc::new(Shared::default());

        let weak = Arc::downgrade(&connector);
        let sink = shared.clone();
        connector.set_frame_listener(Arc::new(move || {
            let Some(connector) = weak.upgrade() else {
                return;
            };
            while let Some(frame) = connector.receive() {
                sink.handle_frame(frame);
            }
        }));

        while let Some(frame) = connector.receive() {
            shared.handle_frame(frame);
        }

        ProtocolSession { connector, shared }
    }

    /// Underlying connector.
    pub fn connector(&self) -> &Arc<C> {
        &self.connector
    }

    /// Open the transport.
    pub fn connect(&self) -> HartResult<()> {
        self.connector.connect()?;
        debug!("session connected");
        Ok(())
    }

    /// Close the transport. Queued responses stay available.
    pub fn disconnect(&self) {
        self.connector.disconnect();
        debug!("session disconnected");
    }

    /// Whether the transport is open.
    pub fn is_connected(&self) -> bool {
        self.connector.is_connected()
    }

    /// Serialize `request` and write it to the transport.
    pub fn send(&self, request: &Request) -> HartResult<()> {
        if !self.connector.is_connected() {
            return Err(TransportError::NotConnected.into());
        }

        let bytes = request.serialize()?;
        self.connector.send(&bytes)?;
        self.shared.requests_sent.fetch_add(1, Ordering::Relaxed);
        debug!(command = request.command(), len = bytes.len(), "request sent");
        Ok(())
    }

    /// Take the oldest received response.
    pub fn dequeue(&self) -> Option<Response> {
        self.shared.queue.lock().pop_front()
    }

    /// Take every queued response, oldest first.
    pub fn drain(&self) -> Vec<Response> {
        self.shared.queue.lock().drain(..).collect()
    }

    /// Number of queued responses.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Register a callback raised once per queued response, in arrival order.
    ///
    /// Callbacks run on the connector's receive path after the response
    /// is queued, outside the session's locks.
    pub fn on_message<F>(&self, listener: F)
    where
        F: Fn(&Response) + Send + Sync + 'static,
    {
        self.shared.listeners.write().push(Arc::new(listener));
    }

    /// Snapshot of the session counters.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            frames_received: self.shared.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.shared.frames_dropped.load(Ordering::Relaxed),
            requests_sent: self.shared.requests_sent.load(Ordering::Relaxed),
        }
    }
}
