//! Fuzz target for `Link` header parsing.
//!
//! Parsing must never panic, whatever the server sends.

#![no_main]

use enforcer_client::parse_next;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(header) = std::str::from_utf8(data) else {
        return;
    };

    if let Some(next) = parse_next(header) {
        assert!(header.contains(next.as_str()));
    }
});
