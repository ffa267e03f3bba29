//! Fuzz target: `wire::frame::decode`
//!
//! Drives arbitrary byte blobs through the frame decoder and asserts it
//! never panics and never authenticates garbage: the only `Ok` results
//! must round-trip from a well-formed frame, which random input does not
//! produce without the keys.
//!
//! cargo fuzz run fuzz_frame_decode

#![no_main]

use fieldlink::wire::cipher::Aes128Ecb;
use fieldlink::wire::frame;
use fieldlink::wire::tag::Mix32;
use libfuzzer_sys::fuzz_target;

const TRANSPORT_KEY: [u8; 16] = *b"fuzzing-cipher-k";
const VEHICLE_KEY: [u8; 16] = *b"fuzzing-tag-key1";

fuzz_target!(|data: &[u8]| {
    let cipher = Aes128Ecb::new(&TRANSPORT_KEY);
    let lookup = |id: &str| (id == "AA100AA").then_some(VEHICLE_KEY);

    if let Ok(decoded) = frame::decode(data, &cipher, &Mix32, &lookup, 0x20) {
        // Authenticated output must uphold the decode invariants even if
        // the fuzzer stumbles onto a forgery.
        assert_eq!(decoded.vehicle.as_str(), "AA100AA");
        assert!(decoded.message.len() <= 92);
    }
});
