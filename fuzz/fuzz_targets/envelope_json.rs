#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((envelope, message)) = hatchery::fuzzing::decode_envelope_line(data) {
        debug_assert_eq!(envelope.kind, message.kind());
        if let Ok(reencoded) = message.into_envelope(envelope.node_id.clone()) {
            debug_assert_eq!(reencoded.kind, envelope.kind);
            debug_assert!(serde_json::to_vec(&reencoded).is_ok());
        }
    }
});
