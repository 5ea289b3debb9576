//! TCP connector for serial-over-TCP bridges.

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::time;
use tracing::debug;

use super::link::{timeout, LinkDriver, LinkSettings};
use super::{Connector, FrameListener};
use crate::error::TransportError;
use crate::frame::RawFrame;

/// Configuration for a [`TcpConnector`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConnectorConfig {
    /// Bridge address, `host:port`.
    pub address: String,
    /// Connect timeout in milliseconds (0 = none).
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds (0 = none). A timeout abandons any partial frame.
    pub read_timeout_ms: u64,
    /// Write timeout in milliseconds (0 = none).
    pub write_timeout_ms: u64,
    /// Size of the reader task's receive buffer.
    pub read_buffer_size: usize,
}

impl Default for TcpConnectorConfig {
    fn default() -> Self {
        TcpConnectorConfig {
            address: "127.0.0.1:5000".to_string(),
            connect_timeout_ms: 2000,
            read_timeout_ms: 1000,
            write_timeout_ms: 1000,
            read_buffer_size: 256,
        }
    }
}

impl TcpConnectorConfig {
    fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            read_timeout: timeout(self.read_timeout_ms),
            write_timeout: timeout(self.write_timeout_ms),
            buffer_size: self.read_buffer_size,
        }
    }
}

/// Connector speaking to a serial-over-TCP bridge.
pub struct TcpConnector {
    config: TcpConnectorConfig,
    driver: LinkDriver,
}

impl TcpConnector {
    /// Create a disconnected connector with its own I/O runtime.
    pub fn new(config: TcpConnectorConfig) -> Result<Self, TransportError> {
        let driver = LinkDriver::new("hart-tcp", config.link_settings())?;
        Ok(TcpConnector { config, driver })
    }

    /// Connector configuration.
    pub fn config(&self) -> &TcpConnectorConfig {
        &self.config
    }
}

impl Connector for TcpConnector {
    fn connect(&self) -> Result<(), TransportError> {
        let address = self.config.address.clone();
        let connect_timeout = timeout(self.config.connect_timeout_ms);

        self.driver.connect(async move {
            let stream = match connect_timeout {
                Some(limit) => time::timeout(limit, TcpStream::connect(&address))
                    .await
                    .map_err(|_| {
                        std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            format!("connect to {address} timed out"),
                        )
                    })??,
                None => TcpStream::connect(&address).await?,
            };
            stream.set_nodelay(true)?;
            Ok::<_, std::io::Error>(stream)
        })?;

        debug!(address = %self.config.address, "TCP connector connected");
        Ok(())
    }

    fn disconnect(&self) {
        if self.driver.disconnect() {
            debug!(address = %self.config.address, "TCP connector disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.driver.is_connected()
    }

    fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        self.driver.send(bytes)
    }

    fn receive(&self) -> Option<RawFrame> {
        self.driver.receiver().receive()
    }

    fn set_frame_listener(&self, listener: FrameListener) {
        self.driver.receiver().set_listener(listener);
    }
}
