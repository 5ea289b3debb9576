//! Common test utilities and helpers

#![allow(dead_code)]

use hart_protocol::{checksum, PREAMBLE_SYMBOL};

/// The on-demand response used throughout the protocol documentation.
pub const SCENARIO_RESPONSE: [u8; 26] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x06, 0x80, 0x00, 0x0E, 0x00, 0x00, 0xFE, 0xFE, 0x96,
    0x08, 0x05, 0x4E, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x58,
];

/// Build a short on-demand response frame with a valid checksum.
pub fn short_response(
    preamble: usize,
    address: u8,
    command: u8,
    code: [u8; 2],
    data: &[u8],
) -> Vec<u8> {
    let mut content = vec![0x06, address, command, (data.len() + 2) as u8];
    content.extend_from_slice(&code);
    content.extend_from_slice(data);
    with_preamble_and_checksum(preamble, &content)
}

/// Wrap frame content (limiter through payload) in a preamble and checksum.
pub fn with_preamble_and_checksum(preamble: usize, content: &[u8]) -> Vec<u8> {
    let mut frame = vec![PREAMBLE_SYMBOL; preamble];
    frame.extend_from_slice(content);
    frame.push(checksum(content));
    frame
}
