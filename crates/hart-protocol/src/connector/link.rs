//! Async byte link shared by the stream connectors.
//!
//! Each connector owns a small tokio runtime. An open link runs two tasks on
//! it: a reader that feeds the [`FrameReceiver`] and a writer fed through an
//! unbounded channel. A read timeout abandons any partial frame so a lost
//! byte cannot stall the stream.

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

use super::FrameReceiver;
use crate::error::TransportError;

/// Convert a millisecond setting to a timeout, 0 meaning none.
pub(super) fn timeout(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Per-link I/O settings.
#[derive(Debug, Clone, Copy)]
pub(super) struct LinkSettings {
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub buffer_size: usize,
}

struct Link {
    running: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Link {
    fn spawn<S>(
        handle: &Handle,
        stream: S,
        receiver: Arc<FrameReceiver>,
        settings: LinkSettings,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (tx, rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));

        let reader = handle.spawn(read_loop(
            read_half,
            receiver,
            running.clone(),
            settings.read_timeout,
            settings.buffer_size.max(1),
        ));
        let writer = handle.spawn(write_loop(
            write_half,
            rx,
            running.clone(),
            settings.write_timeout,
        ));

        Link {
            running,
            tx,
            reader,
            writer,
        }
    }

    fn is_alive(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.tx.is_closed()
    }

    fn close(self) {
        self.running.store(false, Ordering::SeqCst);
        self.reader.abort();
        self.writer.abort();
    }
}

/// Runtime, receive path and current link of a stream connector.
pub(super) struct LinkDriver {
    runtime: Option<Runtime>,
    receiver: Arc<FrameReceiver>,
    link: Mutex<Option<Link>>,
    settings: LinkSettings,
}

impl LinkDriver {
    pub fn new(thread_name: &str, settings: LinkSettings) -> Result<Self, TransportError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name(thread_name)
            .enable_all()
            .build()?;

        Ok(LinkDriver {
            runtime: Some(runtime),
            receiver: Arc::new(FrameReceiver::new()),
            link: Mutex::new(None),
            settings,
        })
    }

    pub fn receiver(&self) -> &FrameReceiver {
        &self.receiver
    }

    /// Open a link with `open` unless a live one exists.
    ///
    /// Blocks the calling thread, so it must not run inside an async context.
    pub fn connect<F, S>(&self, open: F) -> Result<(), TransportError>
    where
        F: Future<Output = io::Result<S>>,
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let mut link = self.link.lock();
        match link.take() {
            Some(current) if current.is_alive() => {
                *link = Some(current);
                return Ok(());
            }
            Some(stale) => stale.close(),
            None => {}
        }

        if Handle::try_current().is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "connect must be called outside an async runtime",
            )
            .into());
        }
        let runtime = self.runtime.as_ref().ok_or(TransportError::NotConnected)?;
        let stream = runtime.block_on(open)?;

        self.receiver.reset_partial();
        *link = Some(Link::spawn(
            runtime.handle(),
            stream,
            self.receiver.clone(),
            self.settings,
        ));
        Ok(())
    }

    /// Close the link. Returns whether one was open.
    pub fn disconnect(&self) -> bool {
        let link = self.link.lock().take();
        match link {
            Some(link) => {
                link.close();
                self.receiver.reset_partial();
                true
            }
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.lock().as_ref().is_some_and(Link::is_alive)
    }

    /// Queue bytes for the writer task.
    pub fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let link = self.link.lock();
        let link = link
            .as_ref()
            .filter(|link| link.is_alive())
            .ok_or(TransportError::NotConnected)?;
        link.tx
            .send(bytes.to_vec())
            .map_err(|_| TransportError::NotConnected)
    }
}

impl Drop for LinkDriver {
    fn drop(&mut self) {
        self.disconnect();
        // the last handle may be released on one of the runtime's own workers
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

async fn read_loop<R>(
    mut reader: R,
    receiver: Arc<FrameReceiver>,
    running: Arc<AtomicBool>,
    read_timeout: Option<Duration>,
    buffer_size: usize,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; buffer_size];

    loop {
        let read = match read_timeout {
            Some(limit) => match time::timeout(limit, reader.read(&mut buf)).await {
                Ok(read) => read,
                Err(_) => {
                    if receiver.reset_partial() {
                        debug!("read timed out mid-frame, partial frame discarded");
                    }
                    continue;
                }
            },
            None => reader.read(&mut buf).await,
        };

        match read {
            Ok(0) => {
                debug!("peer closed the link");
                break;
            }
            Ok(n) => {
                receiver.deliver(&buf[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!(error = %e, "link read failed");
                break;
            }
        }
    }

    running.store(false, Ordering::SeqCst);
}

async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    running: Arc<AtomicBool>,
    write_timeout: Option<Duration>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = rx.recv().await {
        let write = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        };
        let result = match write_timeout {
            Some(limit) => time::timeout(limit, write).await.unwrap_or_else(|_| {
                Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out"))
            }),
            None => write.await,
        };

        if let Err(e) = result {
            warn!(error = %e, len = bytes.len(), "link write failed");
            break;
        }
    }

    running.store(false, Ordering::SeqCst);
}
