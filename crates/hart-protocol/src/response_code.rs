//! Response-code descriptions.
//!
//! The first response-code byte either reports a command outcome (bit 7
//! clear) or a communication failure seen by the device (bit 7 set). The
//! lookup is total: unmapped codes describe as [`UNKNOWN_ERROR`].

/// Description returned for codes without a table entry.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Bit marking the first response-code byte as a communication error.
pub const COMMUNICATION_ERROR_BIT: u8 = 0x80;

/// Describe the first response-code byte.
pub fn describe(code: u8) -> &'static str {
    match code {
        0 => "No error",
        1 => "Undefined",
        2 => "Invalid selection",
        3 => "Passed parameter too large",
        4 => "Passed parameter too small",
        5 => "Too few data bytes received",
        6 => "Device-specific command error",
        7 => "In write-protect mode",
        8 => "Update failure",
        9 => "Applied process too high",
        10 => "Applied process too low",
        11 => "In multidrop mode",
        12 => "Invalid unit code",
        13 => "Both range values out of limits",
        14 => "Span too small",
        16 => "Access restricted",
        32 => "Device busy",
        33 => "Delayed response initiated",
        34 => "Delayed response running",
        35 => "Delayed response dead",
        36 => "Delayed response conflict",
        64 => "Command not implemented",

        0xC0 => "Vertical parity error",
        0xA0 => "Overrun error",
        0x90 => "Framing error",
        0x88 => "Longitudinal parity error",
        0x82 => "Buffer overflow",

        _ => UNKNOWN_ERROR,
    }
}

/// Whether the first response-code byte reports a communication error.
pub fn is_communication_error(code: u8) -> bool {
    code & COMMUNICATION_ERROR_BIT != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_known_codes() {
        assert_eq!(describe(0), "No error");
        assert_eq!(describe(7), "In write-protect mode");
        assert_eq!(describe(64), "Command not implemented");
        assert_eq!(describe(0x90), "Framing error");
    }

    #[test]
    fn test_describe_is_total() {
        for code in 0..=u8::MAX {
            assert!(!describe(code).is_empty());
        }
        assert_eq!(describe(15), UNKNOWN_ERROR);
        assert_eq!(describe(0xFF), UNKNOWN_ERROR);
    }

    #[test]
    fn test_communication_error_bit() {
        assert!(!is_communication_error(0));
        assert!(!is_communication_error(64));
        assert!(is_communication_error(0x82));
        assert!(is_communication_error(0xC0));
    }
}
