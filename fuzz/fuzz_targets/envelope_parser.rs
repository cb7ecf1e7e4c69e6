#![no_main]

use claimcheck_core::envelope::InboundEvent;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(body) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(event) = InboundEvent::from_queue_body(body) {
        let _ = event.locator("fuzz-bucket");
        let _ = event.advertised_digest();
        let _ = event.shape();
    }
});
