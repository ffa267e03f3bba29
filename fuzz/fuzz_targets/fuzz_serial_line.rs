//! Fuzz target: `serial::parse_line`
//!
//! The serial channel carries whatever the glue reads off the UART —
//! partial lines, binary noise, oversized tokens. Parsing must stay
//! total: classify or ignore, never panic.
//!
//! cargo fuzz run fuzz_serial_line

#![no_main]

use fieldlink::serial::{self, SerialInput};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = core::str::from_utf8(data) else {
        return;
    };

    match serial::parse_line(line) {
        SerialInput::BindKey { id, .. } | SerialInput::VehicleUpdate { id, .. } => {
            // Any accepted identifier must satisfy the token charset.
            assert!(!id.as_str().is_empty());
            assert!(!id.as_str().contains([':', ';']));
        }
        SerialInput::Invalid(_) | SerialInput::Ignored => {}
    }
});
