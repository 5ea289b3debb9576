//! Serial-port connector for HART modems.
//!
//! Line defaults are the HART physical layer: 1200 baud, 8 data bits, odd
//! parity and one stop bit.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_serial::{SerialPortBuilder, SerialPortBuilderExt};
use tracing::debug;

use super::link::{timeout, LinkDriver, LinkSettings};
use super::{Connector, FrameListener};
use crate::error::TransportError;
use crate::frame::RawFrame;

/// HART modem line speed.
pub const DEFAULT_BAUD_RATE: u32 = 1200;

/// Parity setting of a serial line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    #[default]
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// Configuration for a [`SerialConnector`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConnectorConfig {
    /// Port name, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    pub baud_rate: u32,
    pub parity: Parity,
    /// 5 to 8.
    pub data_bits: u8,
    /// 1 or 2.
    pub stop_bits: u8,
    /// Read timeout in milliseconds (0 = none). A timeout abandons any partial frame.
    pub read_timeout_ms: u64,
    /// Write timeout in milliseconds (0 = none).
    pub write_timeout_ms: u64,
    /// Size of the reader task's receive buffer.
    pub read_buffer_size: usize,
}

impl Default for SerialConnectorConfig {
    fn default() -> Self {
        SerialConnectorConfig {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            parity: Parity::Odd,
            data_bits: 8,
            stop_bits: 1,
            read_timeout_ms: 1000,
            write_timeout_ms: 1000,
            read_buffer_size: 256,
        }
    }
}

impl SerialConnectorConfig {
    /// Config for `port` with every other setting at its default.
    pub fn for_port(port: impl Into<String>) -> Self {
        SerialConnectorConfig {
            port: port.into(),
            ..Default::default()
        }
    }

    fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            read_timeout: timeout(self.read_timeout_ms),
            write_timeout: timeout(self.write_timeout_ms),
            buffer_size: self.read_buffer_size,
        }
    }

    /// Port builder carrying the line settings.
    fn builder(&self) -> Result<SerialPortBuilder, TransportError> {
        let data_bits = match self.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            8 => tokio_serial::DataBits::Eight,
            other => {
                return Err(TransportError::Config(format!("unsupported data bits: {other}")))
            }
        };
        let stop_bits = match self.stop_bits {
            1 => tokio_serial::StopBits::One,
            2 => tokio_serial::StopBits::Two,
            other => {
                return Err(TransportError::Config(format!("unsupported stop bits: {other}")))
            }
        };

        Ok(tokio_serial::new(&self.port, self.baud_rate)
            .data_bits(data_bits)
            .parity(self.parity.into())
            .stop_bits(stop_bits)
            .timeout(Duration::from_millis(self.read_timeout_ms.max(1))))
    }
}

/// Whether `port` exists and can be opened right now.
///
/// The port is opened with default line settings and closed again.
pub fn is_port_accessible(port: &str) -> bool {
    match tokio_serial::new(port, DEFAULT_BAUD_RATE).open() {
        Ok(_) => true,
        Err(e) => {
            debug!(port, error = %e, "serial port not accessible");
            false
        }
    }
}

/// Connector driving a HART modem on a serial port.
pub struct SerialConnector {
    config: SerialConnectorConfig,
    driver: LinkDriver,
}

impl SerialConnector {
    /// Create a closed connector with its own I/O runtime.
    pub fn new(config: SerialConnectorConfig) -> Result<Self, TransportError> {
        let driver = LinkDriver::new("hart-serial", config.link_settings())?;
        Ok(SerialConnector { config, driver })
    }

    /// Connector configuration.
    pub fn config(&self) -> &SerialConnectorConfig {
        &self.config
    }
}

impl Connector for SerialConnector {
    fn connect(&self) -> Result<(), TransportError> {
        let builder = self.config.builder()?;

        // the async port registers with the reactor, so it opens on the runtime
        self.driver
            .connect(async move { builder.open_native_async().map_err(std::io::Error::from) })?;

        debug!(
            port = %self.config.port,
            baud_rate = self.config.baud_rate,
            "serial connector opened"
        );
        Ok(())
    }

    fn disconnect(&self) {
        if self.driver.disconnect() {
            debug!(port = %self.config.port, "serial connector closed");
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

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING_PORT: &str = "/dev/hart-no-such-port";

    #[test]
    fn test_config_defaults() {
        let config = SerialConnectorConfig::default();
        assert_eq!(config.baud_rate, 1200);
        assert_eq!(config.parity, Parity::Odd);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.stop_bits, 1);
        assert_eq!(config.read_timeout_ms, 1000);
        assert_eq!(config.write_timeout_ms, 1000);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: SerialConnectorConfig =
            serde_json::from_str(r#"{"port": "COM3", "parity": "even"}"#).unwrap();
        assert_eq!(config.port, "COM3");
        assert_eq!(config.parity, Parity::Even);
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
    }

    #[test]
    fn test_invalid_line_settings() {
        let mut config = SerialConnectorConfig::for_port(MISSING_PORT);
        config.data_bits = 9;
        assert!(matches!(config.builder(), Err(TransportError::Config(_))));

        config.data_bits = 7;
        config.stop_bits = 3;
        let connector = SerialConnector::new(config).unwrap();
        assert!(matches!(connector.connect(), Err(TransportError::Config(_))));
    }

    #[test]
    fn test_missing_port() {
        assert!(!is_port_accessible(MISSING_PORT));

        let config = SerialConnectorConfig::for_port(MISSING_PORT);
        let connector = SerialConnector::new(config).unwrap();
        assert!(matches!(connector.connect(), Err(TransportError::Io(_))));
        assert!(!connector.is_connected());
        assert!(matches!(
            connector.send(&[0xFF]),
            Err(TransportError::NotConnected)
        ));
    }
}
