//! Subcommand implementations.
//!
//! Each command returns its output as text so `main` only prints.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use hart_protocol::connector::is_port_accessible;
use hart_protocol::value;
use hart_protocol::{
    Connector, FrameFormat, Message, ProtocolSession, RawFrame, Request, Response,
    SerialConnector, SerialConnectorConfig, TcpConnector, TcpConnectorConfig, ValueKind,
};

use crate::cli::RequestArgs;
use crate::config::{CliConfig, RequestDefaults, Transport};

/// Where `hart send` delivers its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Tcp(TcpConnectorConfig),
    Serial(SerialConnectorConfig),
}

impl Target {
    /// Pick the transport: `--port` wins, then `--bridge`, then the config file.
    pub fn select(config: &CliConfig, bridge: Option<String>, port: Option<String>) -> Self {
        match (bridge, port) {
            (_, Some(port)) => Target::Serial(SerialConnectorConfig {
                port,
                ..config.serial.clone()
            }),
            (Some(address), None) => Target::Tcp(TcpConnectorConfig {
                address,
                ..config.connector.clone()
            }),
            (None, None) => match config.transport {
                Transport::Tcp => Target::Tcp(config.connector.clone()),
                Transport::Serial => Target::Serial(config.serial.clone()),
            },
        }
    }
}

#[derive(Serialize)]
struct EncodedRequest<'a> {
    request: &'a Request,
    frame: String,
}

/// Parse hex bytes, ignoring whitespace, `:` and `-` separators and `0x` prefixes.
pub fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let digits: String = input
        .split(|c: char| c.is_whitespace() || c == ':' || c == '-' || c == ',')
        .map(|token| token.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();
    hex::decode(&digits).with_context(|| format!("invalid hex input {input:?}"))
}

/// Format bytes as spaced uppercase hex.
pub fn format_hex(bytes: &[u8]) -> String {
    RawFrame::from(bytes.to_vec()).to_string()
}

/// Build a request from command-line arguments and configured defaults.
pub fn build_request(args: &RequestArgs, defaults: &RequestDefaults) -> Result<Request> {
    let format = args.format.map(FrameFormat::from).unwrap_or(defaults.format);
    let mode = args.mode.map(Into::into).unwrap_or(defaults.mode);

    let address = match (&args.address, format) {
        (Some(address), _) => parse_hex(address)?,
        (None, FrameFormat::Short) => vec![0],
        (None, FrameFormat::Long) => bail!("long frames need an explicit --address"),
    };

    let mut request = Request::new(format, args.command)
        .with_preamble(args.preamble.unwrap_or(defaults.preamble))
        .with_mode(mode)
        .with_address(address)?;

    if let Some(data) = &args.data {
        request = request.with_data(parse_hex(data)?);
    }
    if args.no_data_in_frame {
        request = request.without_data_in_frame();
    }
    Ok(request)
}

/// `hart encode`
pub fn encode(args: &RequestArgs, defaults: &RequestDefaults, json: bool) -> Result<String> {
    let request = build_request(args, defaults)?;
    let frame = format_hex(&request.serialize()?);
    if json {
        return Ok(serde_json::to_string_pretty(&EncodedRequest {
            request: &request,
            frame,
        })?);
    }
    Ok(frame)
}

/// `hart decode`
pub fn decode(frame: &str, json: bool) -> Result<String> {
    let bytes = parse_hex(frame)?;
    let response = Response::deserialize(&bytes)?;
    render_response(&response, json)
}

/// `hart value`
pub fn decode_value(kind: &str, bytes: &str, json: bool) -> Result<String> {
    let kind: ValueKind = kind.parse()?;
    let bytes = parse_hex(bytes)?;
    let value = value::decode(kind, Some(bytes.as_slice()))?;
    if json {
        return Ok(serde_json::to_string(&value)?);
    }
    Ok(value.to_string())
}

/// `hart port`
pub fn check_port(port: &str) -> String {
    if is_port_accessible(port) {
        format!("{port}: accessible")
    } else {
        format!("{port}: not accessible")
    }
}

/// `hart send`
///
/// Sends one request and collects every response that arrives within `wait`.
pub fn send(
    args: &RequestArgs,
    defaults: &RequestDefaults,
    target: Target,
    wait: Duration,
    json: bool,
) -> Result<Vec<String>> {
    let request = build_request(args, defaults)?;

    match target {
        Target::Tcp(config) => {
            let peer = config.address.clone();
            exchange(TcpConnector::new(config)?, &peer, &request, wait, json)
        }
        Target::Serial(config) => {
            let peer = config.port.clone();
            exchange(SerialConnector::new(config)?, &peer, &request, wait, json)
        }
    }
}

fn exchange<C: Connector>(
    connector: C,
    peer: &str,
    request: &Request,
    wait: Duration,
    json: bool,
) -> Result<Vec<String>> {
    let session = ProtocolSession::new(connector);
    let (tx, rx) = crossbeam_channel::unbounded();
    session.on_message(move |response: &Response| {
        let _ = tx.send(response.clone());
    });

    session
        .connect()
        .with_context(|| format!("failed to connect to {peer}"))?;
    info!(peer, "connected");

    session.send(request)?;
    debug!(command = request.command(), "request sent, waiting for responses");

    let deadline = Instant::now() + wait;
    let mut output = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match rx.recv_timeout(remaining) {
            Ok(response) => output.push(render_response(&response, json)?),
            Err(_) => break,
        }
    }

    let stats = session.stats();
    if stats.frames_dropped > 0 {
        warn!(dropped = stats.frames_dropped, "invalid frames were dropped");
    }
    session.disconnect();

    if output.is_empty() {
        warn!("no response within {} ms", wait.as_millis());
    }
    Ok(output)
}

fn render_response(response: &Response, json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(response)?);
    }

    let mut out = String::new();
    writeln!(
        out,
        "format:   {:?}{}",
        response.frame_format(),
        if response.is_batch_mode() { " (batch)" } else { "" }
    )?;
    writeln!(out, "address:  {}", format_hex(response.address()))?;
    writeln!(out, "command:  {}", response.command())?;
    writeln!(
        out,
        "status:   0x{:02X} 0x{:02X} ({})",
        response.communication_status(),
        response.device_status(),
        response.communication_error()
    )?;
    write!(out, "data:     {}", format_hex(response.data()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{FormatArg, ModeArg};

    const SCENARIO: &str =
        "FF FF FF FF FF FF FF 06 80 00 0E 00 00 FE FE 96 08 05 4E 04 01 00 00 00 00 58";

    fn request_args(command: u16) -> RequestArgs {
        RequestArgs {
            command,
            address: None,
            format: None,
            mode: None,
            preamble: None,
            data: None,
            no_data_in_frame: false,
        }
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("FF 06 0a").unwrap(), [0xFF, 0x06, 0x0A]);
        assert_eq!(parse_hex("0xFF,0x06").unwrap(), [0xFF, 0x06]);
        assert_eq!(parse_hex("26:4e:00").unwrap(), [0x26, 0x4E, 0x00]);
        assert!(parse_hex("F").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn test_encode_defaults() {
        let mut args = request_args(0);
        args.preamble = Some(3);
        assert_eq!(
            encode(&args, &RequestDefaults::default(), false).unwrap(),
            "FF FF FF 02 00 00 00 02"
        );
    }

    #[test]
    fn test_encode_long_frame() {
        let mut args = request_args(300);
        args.format = Some(FormatArg::Long);
        args.mode = Some(ModeArg::Batch);
        args.address = Some("26 4E 00 00 01".to_string());
        args.preamble = Some(2);

        let frame = parse_hex(&encode(&args, &RequestDefaults::default(), false).unwrap()).unwrap();
        assert_eq!(
            &frame[..11],
            &[0xFF, 0xFF, 0x81, 0x26, 0x4E, 0x00, 0x00, 0x01, 0xFE, 0x2E, 0x00]
        );
    }

    #[test]
    fn test_encode_json() {
        let mut args = request_args(1);
        args.preamble = Some(3);
        let out = encode(&args, &RequestDefaults::default(), true).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(json["request"]["command"], 1);
        assert_eq!(json["request"]["format"], "short");
        assert_eq!(json["request"]["mode"], "acknowledge");
        assert_eq!(json["frame"], "FF FF FF 02 00 01 00 03");
    }

    #[test]
    fn test_long_frame_needs_address() {
        let mut args = request_args(0);
        args.format = Some(FormatArg::Long);
        assert!(build_request(&args, &RequestDefaults::default()).is_err());

        args.address = Some("01".to_string());
        assert!(build_request(&args, &RequestDefaults::default()).is_err());
    }

    #[test]
    fn test_data_omitted_from_frame() {
        let mut args = request_args(0);
        args.preamble = Some(3);
        args.data = Some("48 65 6C 6C 6F".to_string());
        args.no_data_in_frame = true;

        let request = build_request(&args, &RequestDefaults::default()).unwrap();
        assert_eq!(request.data(), b"Hello");
        assert_eq!(
            format_hex(&request.serialize().unwrap()),
            "FF FF FF 02 00 00 00 02"
        );
    }

    #[test]
    fn test_decode_text() {
        let out = decode(SCENARIO, false).unwrap();
        assert!(out.contains("format:   Short"));
        assert!(out.contains("address:  80"));
        assert!(out.contains("(No error)"));
        assert!(out.ends_with("FE FE 96 08 05 4E 04 01 00 00 00 00"));
    }

    #[test]
    fn test_decode_json() {
        let out = decode(SCENARIO, true).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["command"], 0);
        assert_eq!(json["response_code"], 0);
        assert_eq!(json["communication_error"], "No error");
        assert_eq!(json["data"].as_array().unwrap().len(), 12);
    }

    #[test]
    fn test_decode_bad_checksum() {
        let bad = SCENARIO.replace(" 58", " 59");
        let err = decode(&bad, false).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_decode_value() {
        assert_eq!(decode_value("uint16", "F4 01", false).unwrap(), "500");
        assert_eq!(decode_value("float32", "00 00 80 3F", false).unwrap(), "1");
        assert_eq!(decode_value("date", "0A 04 78", false).unwrap(), "2020-04-10");
        assert_eq!(decode_value("text", "48 69", false).unwrap(), "\"Hi\"");
        assert!(decode_value("decimal", "00", false).is_err());
        assert!(decode_value("uint16", "00", false).is_err());
    }

    #[test]
    fn test_decode_value_json() {
        let json: serde_json::Value =
            serde_json::from_str(&decode_value("uint16", "F4 01", true).unwrap()).unwrap();
        assert_eq!(json["kind"], "uint16");
        assert_eq!(json["value"], 500);

        let json: serde_json::Value =
            serde_json::from_str(&decode_value("flags", "05", true).unwrap()).unwrap();
        assert_eq!(json["kind"], "flags");
        assert_eq!(json["value"][0], true);
        assert_eq!(json["value"][1], false);
        assert_eq!(json["value"][2], true);
    }

    #[test]
    fn test_target_selection() {
        let mut config = CliConfig::default();
        assert!(matches!(Target::select(&config, None, None), Target::Tcp(_)));

        let Target::Tcp(tcp) = Target::select(&config, Some("10.0.0.5:4001".into()), None) else {
            panic!("bridge flag selects TCP");
        };
        assert_eq!(tcp.address, "10.0.0.5:4001");
        assert_eq!(tcp.read_timeout_ms, config.connector.read_timeout_ms);

        config.transport = Transport::Serial;
        assert!(matches!(Target::select(&config, None, None), Target::Serial(_)));

        config.transport = Transport::Tcp;
        let Target::Serial(serial) = Target::select(&config, None, Some("COM3".into())) else {
            panic!("port flag selects serial");
        };
        assert_eq!(serial.port, "COM3");
        assert_eq!(serial.baud_rate, 1200);
    }

    #[test]
    fn test_check_missing_port() {
        assert_eq!(
            check_port("/dev/hart-no-such-port"),
            "/dev/hart-no-such-port: not accessible"
        );
    }
}
