//! Fuzz target for system-hook payload decoding.
//!
//! Arbitrary JSON must decode or fail cleanly. Decoded payloads never carry
//! an embedded resource object.

#![no_main]

use enforcer_core::SystemEvent;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(event) = serde_json::from_slice::<SystemEvent>(data) {
        if event.is_other() {
            return;
        }
        assert!(event.group().is_none());
        assert!(event.project().is_none());
        let _ = event.created_at;
    }
});
