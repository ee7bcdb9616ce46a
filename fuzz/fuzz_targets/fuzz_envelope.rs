#![no_main]

use arena_live_client::protocol::{decode_event, BattleEvent, FineTuneEvent, PlaygroundEvent};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Exercise the raw-byte deserialization path (includes serde_json's
    // own UTF-8 validation and error handling for invalid sequences).
    let _ = serde_json::from_slice::<BattleEvent>(data);

    // The str-based path is what the read loop actually uses: every domain's
    // decode must drop arbitrary input without panicking.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = decode_event::<BattleEvent>(s);
        let _ = decode_event::<PlaygroundEvent>(s);
        let _ = decode_event::<FineTuneEvent>(s);
    }
});
