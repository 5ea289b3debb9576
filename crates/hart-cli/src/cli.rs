use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use hart_protocol::{FrameFormat, FrameMode};

/// Build, parse and exchange HART frames from the command line
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serialize a request and print the frame as hex
    Encode {
        #[command(flatten)]
        request: RequestArgs,

        /// Print the request fields and frame as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a response frame given as hex
    Decode {
        /// Frame bytes in hex, separators allowed
        frame: String,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode payload bytes as a typed value
    Value {
        /// Value kind: text, float32, float64, uint16, uint24, date or flags
        kind: String,

        /// Payload bytes in hex
        bytes: String,

        /// Print the value as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send a request to a device and print the responses
    ///
    /// Uses the serial-over-TCP bridge unless a serial port is given.
    Send {
        #[command(flatten)]
        request: RequestArgs,

        /// Bridge address (host:port), overrides the configuration file
        #[arg(short, long, conflicts_with = "port")]
        bridge: Option<String>,

        /// Serial port of a HART modem, e.g. /dev/ttyUSB0 or COM3
        #[arg(long)]
        port: Option<String>,

        /// How long to collect responses, in milliseconds
        #[arg(short, long, default_value_t = 1000)]
        wait: u64,

        /// Print responses as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether a serial port can be opened
    Port {
        /// Port name
        port: String,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct RequestArgs {
    /// Command number (0-509)
    pub command: u16,

    /// Device address in hex: 1 byte for short frames, 5 for long frames
    #[arg(short, long)]
    pub address: Option<String>,

    /// Frame format
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Limiter mode
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Number of preamble bytes
    #[arg(short, long)]
    pub preamble: Option<usize>,

    /// Payload bytes in hex
    #[arg(short, long)]
    pub data: Option<String>,

    /// Keep the payload out of the serialized frame
    #[arg(long)]
    pub no_data_in_frame: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// One-byte polling address
    Short,

    /// Five-byte unique address
    Long,
}

impl From<FormatArg> for FrameFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Short => FrameFormat::Short,
            FormatArg::Long => FrameFormat::Long,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Burst mode
    Batch,

    /// Master request
    Acknowledge,

    /// Polled answer
    OnDemand,
}

impl From<ModeArg> for FrameMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Batch => FrameMode::Batch,
            ModeArg::Acknowledge => FrameMode::Acknowledge,
            ModeArg::OnDemand => FrameMode::OnDemand,
        }
    }
}
