#![no_main]

use libfuzzer_sys::fuzz_target;
use mavlink_engine::Header;

fuzz_target!(|data: &[u8]| {
    // A decoded header must encode back to the bytes it came from
    if let Ok(header) = Header::decode(data) {
        if let Ok(encoded) = header.encode(false) {
            assert_eq!(&encoded[..], &data[..encoded.len()]);
        }
    }
});
