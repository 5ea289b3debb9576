//! CLI configuration, loaded from YAML.
//!
//! ```yaml
//! connector:
//!   address: 192.168.1.20:4001
//!   read_timeout_ms: 500
//! serial:
//!   port: /dev/ttyUSB0
//!   parity: odd
//! transport: serial
//! request:
//!   preamble: 5
//!   format: long
//!   mode: acknowledge
//! ```
//!
//! Every field is optional. Command-line flags override the file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use hart_protocol::{
    FrameFormat, FrameMode, SerialConnectorConfig, TcpConnectorConfig, DEFAULT_PREAMBLE_LEN,
};

/// Top-level CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Transport used by `send` when no flag picks one.
    pub transport: Transport,
    /// Bridge connection settings.
    pub connector: TcpConnectorConfig,
    /// Serial modem settings.
    pub serial: SerialConnectorConfig,
    /// Defaults applied to requests built from the command line.
    pub request: RequestDefaults,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Tcp,
    Serial,
}

/// Request fields used when no flag sets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDefaults {
    pub preamble: usize,
    pub format: FrameFormat,
    pub mode: FrameMode,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        RequestDefaults {
            preamble: DEFAULT_PREAMBLE_LEN,
            format: FrameFormat::Short,
            mode: FrameMode::Acknowledge,
        }
    }
}

impl CliConfig {
    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}
